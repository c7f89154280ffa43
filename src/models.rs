//! Core data types flowing through the ingestion and query pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kind of source a document (and its chunks) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markdown,
    Pdf,
    Web,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceKind::Markdown => "markdown",
            SourceKind::Pdf => "pdf",
            SourceKind::Web => "web",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(SourceKind::Markdown),
            "pdf" => Ok(SourceKind::Pdf),
            "web" => Ok(SourceKind::Web),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// An identified piece of content before chunking. Immutable once loaded;
/// its lifecycle ends after the splitter has consumed it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Stable identifier derived from the origin locator.
    pub source_id: String,
    pub kind: SourceKind,
    /// File path or URL the text came from.
    pub origin: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(kind: SourceKind, origin: impl Into<String>, text: String) -> Self {
        let origin = origin.into();
        Self {
            source_id: source_id_for(&origin),
            kind,
            origin,
            text,
        }
    }
}

/// Hex SHA-256 of an origin locator; stable across runs.
pub fn source_id_for(origin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A contiguous piece of a source document, the unit of retrieval.
///
/// For a given source, `index` values form a dense `0..total_chunks` range
/// in original-text order. Chunks are created once at ingestion time and
/// destroyed only by a full re-ingestion, never mutated individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id, assigned in strict emission order per run.
    pub id: String,
    pub text: String,
    /// 0-based position among chunks from the same source.
    pub index: usize,
    /// Count of chunks produced from the same source.
    pub total_chunks: usize,
    pub source_id: String,
    pub kind: SourceKind,
    pub origin: String,
}

/// A chunk scored against a query. Constructed per query and discarded
/// after the context assembler consumes it.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Similarity in `[0, 1]`; higher is more relevant.
    pub score: f64,
    /// 1-based position in the result set.
    pub rank: usize,
}

/// Output of the context assembler: citation-numbered chunks plus the
/// concatenated context block and the final generation prompt.
///
/// Citation numbers are 1-based, assigned in rank order, and identical in
/// the context block and [`crate::assemble::source_summaries`] output, so
/// numbers referenced in generated text stay dereferenceable.
#[derive(Debug, Clone)]
pub struct CitedContext {
    pub entries: Vec<(usize, Chunk)>,
    pub context_block: String,
    pub prompt: String,
}

/// Per-source display row for a query response.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub origin: String,
    pub kind: SourceKind,
    /// Chunk position within its source, e.g. `"2/7"`.
    pub position: String,
    /// Formatted similarity, e.g. `"87.3%"`.
    pub similarity: String,
    pub preview: String,
}

/// What happened to one source during an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Ingested { chunks: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub origin: String,
    pub kind: SourceKind,
    pub outcome: SourceOutcome,
}

/// Aggregated result of one ingestion run. Surfaced to the caller instead
/// of only printed, so per-source failures stay visible.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub chunks_written: u64,
}

impl IngestReport {
    pub fn ingested(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Ingested { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    /// True when the run produced no chunks at all ("nothing to ingest").
    pub fn is_empty(&self) -> bool {
        self.chunks_written == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_stable() {
        let a = source_id_for("data/markdown/notes.md");
        let b = source_id_for("data/markdown/notes.md");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, source_id_for("data/markdown/other.md"));
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [SourceKind::Markdown, SourceKind::Pdf, SourceKind::Web] {
            let parsed: SourceKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("docx".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_report_counts() {
        let report = IngestReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sources: vec![
                SourceReport {
                    origin: "a.md".into(),
                    kind: SourceKind::Markdown,
                    outcome: SourceOutcome::Ingested { chunks: 3 },
                },
                SourceReport {
                    origin: "https://example.com".into(),
                    kind: SourceKind::Web,
                    outcome: SourceOutcome::Skipped {
                        reason: "no text extracted".into(),
                    },
                },
                SourceReport {
                    origin: "b.pdf".into(),
                    kind: SourceKind::Pdf,
                    outcome: SourceOutcome::Failed {
                        reason: "unreadable".into(),
                    },
                },
            ],
            chunks_written: 3,
        };
        assert_eq!(report.ingested(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_empty());
    }
}
