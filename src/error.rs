//! Error taxonomy for the ragbase core.
//!
//! Per-source extraction failures during ingestion are aggregated into the
//! run report and never abort the run; every other variant propagates to
//! the immediate caller. Upstream variants are retryable at the caller's
//! discretion; the core makes a single bounded attempt per external call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking or retrieval parameters. The caller must fix the
    /// configuration before retrying.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A single source failed text extraction. Recovered by skipping that
    /// source; recorded in the ingestion report.
    #[error("extraction failed for {origin}: {reason}")]
    Extraction { origin: String, reason: String },

    /// Query or stats against an index that has never been committed.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// An ingestion run produced zero chunks; no index was created or
    /// replaced.
    #[error("nothing to ingest: no source produced any chunks")]
    EmptyIngestion,

    /// An external call exceeded its deadline.
    #[error("{service} request timed out")]
    UpstreamTimeout { service: &'static str },

    /// An external service failed.
    #[error("{service} error: {reason}")]
    Upstream { service: &'static str, reason: String },

    /// Storage-layer fault.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a reqwest failure for `service`: timeouts are retryable
    /// with backoff, everything else is a plain upstream failure.
    pub(crate) fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::UpstreamTimeout { service }
        } else {
            Error::Upstream {
                service,
                reason: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
