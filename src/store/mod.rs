//! Vector store boundary.
//!
//! [`VectorStore`] abstracts the index holding chunk text, provenance
//! metadata, and embeddings. Ingestion writes through a staging handle
//! that becomes visible only at [`commit`](VectorStore::commit); a handle
//! that is never committed leaves the previously published index intact.
//! Queries run against the last committed generation.
//!
//! Backends: SQLite ([`sqlite::SqliteStore`]) for persistence and an
//! in-memory store ([`memory::MemoryStore`]) for tests.

pub mod memory;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, SourceKind};

/// Opaque reference to one generation of a named index.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    pub(crate) index: String,
    pub(crate) generation: i64,
}

impl IndexHandle {
    pub fn index(&self) -> &str {
        &self.index
    }
}

/// A stored chunk coming back from a similarity query.
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub id: String,
    pub text: String,
    pub origin: String,
    pub kind: SourceKind,
    /// 0-based chunk position within its source.
    pub index: usize,
    pub total_chunks: usize,
    pub source_id: String,
    /// Cosine distance; lower is closer.
    pub distance: f64,
}

/// Similarity index over embedded chunks.
///
/// Index replacement is create-new, then atomic swap, then delete-old:
/// `create_or_replace` opens a fresh staging generation while readers keep
/// seeing the previously committed one, and `commit` publishes the staging
/// generation in a single serialized step.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Start a fresh, empty generation of `index` and return its staging
    /// handle. Also garbage-collects staging generations abandoned by
    /// earlier runs.
    async fn create_or_replace(&self, index: &str) -> Result<IndexHandle>;

    /// Add chunks (text, metadata, embedding) to a staging generation.
    async fn add(&self, handle: &IndexHandle, chunks: &[Chunk]) -> Result<()>;

    /// Atomically publish a staging generation as the current one and
    /// delete the superseded rows. Serialized per store; only one run can
    /// be committing at a time.
    async fn commit(&self, handle: IndexHandle) -> Result<()>;

    /// Open the committed generation of `index` for reading. Fails with
    /// `IndexNotFound` when no generation has ever been committed.
    async fn open(&self, index: &str) -> Result<IndexHandle>;

    /// Similarity-search the generation behind `handle`. Returns up to
    /// `top_k` hits ordered by ascending distance, ties broken by chunk id
    /// so results are deterministic. Fewer matches than `top_k` is not an
    /// error.
    async fn query(&self, handle: &IndexHandle, text: &str, top_k: usize)
        -> Result<Vec<StoredHit>>;

    /// Number of chunks in the generation behind `handle`.
    async fn count(&self, handle: &IndexHandle) -> Result<u64>;

    /// Drop every generation of `index`; a no-op when the index is absent.
    async fn delete_if_exists(&self, index: &str) -> Result<()>;
}
