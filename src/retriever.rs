//! Similarity retrieval over the vector store.
//!
//! A thin boundary: the store decides ordering with its native distance
//! metric, this module only normalizes scores and assigns ranks.

use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievedChunk};
use crate::store::VectorStore;

/// Retrieve up to `top_k` chunks for `query` from the named index.
///
/// Fails with `IndexNotFound` when the index was never committed and with
/// `InvalidConfiguration` when `top_k` is zero. Fewer than `top_k`
/// matches just yields a shorter list. Results keep the store's order
/// (closest first, store-side tiebreak); ranks are a gapless 1-based
/// sequence over that order.
pub async fn retrieve(
    store: &dyn VectorStore,
    index: &str,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if top_k == 0 {
        return Err(Error::InvalidConfiguration("top_k must be > 0".into()));
    }

    let handle = store.open(index).await?;
    let hits = store.query(&handle, query, top_k).await?;

    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| {
            // The store reports cosine distance, so similarity is
            // 1 - distance; clamped because anti-correlated vectors can
            // push the raw value below zero.
            let score = (1.0 - hit.distance).clamp(0.0, 1.0);
            RetrievedChunk {
                chunk: Chunk {
                    id: hit.id,
                    text: hit.text,
                    index: hit.index,
                    total_chunks: hit.total_chunks,
                    source_id: hit.source_id,
                    kind: hit.kind,
                    origin: hit.origin,
                },
                score,
                rank: i + 1,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::test_support::{sample_chunk, TestEmbedder};

    async fn seeded_store(texts: &[&str]) -> MemoryStore {
        let store = MemoryStore::new(Box::new(TestEmbedder));
        let handle = store.create_or_replace("kb").await.unwrap();
        let chunks: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| sample_chunk(&format!("chunk_{i}"), text))
            .collect();
        store.add(&handle, &chunks).await.unwrap();
        store.commit(handle).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ranks_are_gapless_from_one() {
        let store = seeded_store(&["aaaa", "bbbb", "cccc", "dddd"]).await;
        let results = retrieve(&store, "kb", "aaaa", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
        }
    }

    #[tokio::test]
    async fn test_top_k_larger_than_index_returns_available() {
        let store = seeded_store(&["aaaa", "bbbb"]).await;
        let results = retrieve(&store, "kb", "aaaa", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_scores_in_unit_interval_and_descending_with_distance() {
        let store = seeded_store(&["aaaa", "aaab", "bbbb"]).await;
        let results = retrieve(&store, "kb", "aaaa", 3).await.unwrap();
        for r in &results {
            assert!((0.0..=1.0).contains(&r.score), "score {} out of range", r.score);
        }
        assert!(results[0].score >= results[1].score);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].chunk.text, "aaaa");
    }

    #[tokio::test]
    async fn test_missing_index_is_index_not_found() {
        let store = MemoryStore::new(Box::new(TestEmbedder));
        let err = retrieve(&store, "kb", "anything", 5).await.unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected_before_store_access() {
        let store = MemoryStore::new(Box::new(TestEmbedder));
        let err = retrieve(&store, "kb", "anything", 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_results() {
        let store = seeded_store(&[]).await;
        let results = retrieve(&store, "kb", "anything", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
