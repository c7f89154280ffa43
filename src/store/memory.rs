//! In-memory [`VectorStore`] implementation.
//!
//! Backed by maps behind a `std::sync::Mutex`; vector search is
//! brute-force cosine distance over all stored rows. Mirrors the SQLite
//! backend's generation semantics, which makes it the store of choice for
//! library-level tests that want the full staging/commit lifecycle
//! without touching disk.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::Chunk;

use super::{IndexHandle, StoredHit, VectorStore};

pub struct MemoryStore {
    embedder: Box<dyn Embedder>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_gen: i64,
    generations: HashMap<i64, Generation>,
    current: HashMap<String, i64>,
}

struct Generation {
    index: String,
    rows: Vec<(Chunk, Vec<f32>)>,
}

impl MemoryStore {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only happens after a panic in another test
        // thread; propagating the inner state is still sound here.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_or_replace(&self, index: &str) -> Result<IndexHandle> {
        let mut inner = self.lock();
        inner.next_gen += 1;
        let generation = inner.next_gen;

        let current = inner.current.get(index).copied();
        inner.generations.retain(|id, data| {
            data.index != index || *id == generation || Some(*id) == current
        });
        inner.generations.insert(
            generation,
            Generation {
                index: index.to_string(),
                rows: Vec::new(),
            },
        );

        Ok(IndexHandle {
            index: index.to_string(),
            generation,
        })
    }

    async fn add(&self, handle: &IndexHandle, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut inner = self.lock();
        let generation = inner
            .generations
            .get_mut(&handle.generation)
            .ok_or_else(|| Error::IndexNotFound(handle.index.clone()))?;
        generation
            .rows
            .extend(chunks.iter().cloned().zip(vectors.into_iter()));
        Ok(())
    }

    async fn commit(&self, handle: IndexHandle) -> Result<()> {
        let mut inner = self.lock();
        let old = inner.current.insert(handle.index.clone(), handle.generation);
        if let Some(old_gen) = old {
            if old_gen != handle.generation {
                inner.generations.remove(&old_gen);
            }
        }
        Ok(())
    }

    async fn open(&self, index: &str) -> Result<IndexHandle> {
        let inner = self.lock();
        inner
            .current
            .get(index)
            .map(|generation| IndexHandle {
                index: index.to_string(),
                generation: *generation,
            })
            .ok_or_else(|| Error::IndexNotFound(index.to_string()))
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<StoredHit>> {
        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream {
                service: "embedding",
                reason: "empty embedding response".into(),
            })?;

        let inner = self.lock();
        let generation = inner
            .generations
            .get(&handle.generation)
            .ok_or_else(|| Error::IndexNotFound(handle.index.clone()))?;

        let mut hits: Vec<StoredHit> = generation
            .rows
            .iter()
            .map(|(chunk, vector)| StoredHit {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                origin: chunk.origin.clone(),
                kind: chunk.kind,
                index: chunk.index,
                total_chunks: chunk.total_chunks,
                source_id: chunk.source_id.clone(),
                distance: 1.0 - cosine_similarity(&query_vec, vector) as f64,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, handle: &IndexHandle) -> Result<u64> {
        let inner = self.lock();
        let generation = inner
            .generations
            .get(&handle.generation)
            .ok_or_else(|| Error::IndexNotFound(handle.index.clone()))?;
        Ok(generation.rows.len() as u64)
    }

    async fn delete_if_exists(&self, index: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.current.remove(index);
        inner.generations.retain(|_, data| data.index != index);
        Ok(())
    }
}
