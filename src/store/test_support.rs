//! Shared fixtures for store tests.

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::{Chunk, SourceKind};

/// Deterministic bag-of-bytes embedder: bucket counts of byte values
/// modulo the dimensionality. Similar texts land close together.
pub struct TestEmbedder;

#[async_trait]
impl Embedder for TestEmbedder {
    fn model_name(&self) -> &str {
        "test"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0f32; 8];
                for b in text.bytes() {
                    v[(b % 8) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

pub fn sample_chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        index: 0,
        total_chunks: 1,
        source_id: "test-source".into(),
        kind: SourceKind::Markdown,
        origin: "test.md".into(),
    }
}
