//! SQLite-backed [`VectorStore`].
//!
//! Chunks live in generation-numbered rows; a `collections` table points
//! each index name at its current generation. `create_or_replace` opens a
//! new generation without touching the current one, and `commit` flips the
//! pointer and deletes superseded rows inside one write transaction, so
//! readers never observe a half-built index and concurrent committers are
//! serialized by SQLite's single-writer rule.
//!
//! Similarity search embeds the query text and scans the generation's
//! embedding blobs with brute-force cosine distance, ordered ascending
//! with a chunk-id tiebreak.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::{Error, Result};
use crate::models::{Chunk, SourceKind};

use super::{IndexHandle, StoredHit, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn connect(
        path: &Path,
        embedder: Box<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(Error::Store)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        ensure_schema(&pool).await?;

        Ok(Self {
            pool,
            embedder,
            batch_size: batch_size.max(1),
        })
    }

    /// Convenience constructor wiring the configured embedding provider.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = embedding::create_embedder(&config.embedding)?;
        Self::connect(&config.store.path, embedder, config.embedding.batch_size).await
    }

    async fn embed_in_batches(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embedder.embed(batch).await?);
        }
        if vectors.len() != texts.len() {
            return Err(Error::Upstream {
                service: "embedding",
                reason: format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            });
        }
        Ok(vectors)
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            current_gen INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            gen INTEGER NOT NULL,
            id TEXT NOT NULL,
            text TEXT NOT NULL,
            origin TEXT NOT NULL,
            kind TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            source_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (gen, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn create_or_replace(&self, index: &str) -> Result<IndexHandle> {
        let mut tx = self.pool.begin().await?;

        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO generations (collection, created_at) VALUES (?, ?)")
            .bind(index)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        let generation: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut *tx)
            .await?;

        // Garbage-collect staging generations abandoned by earlier runs:
        // everything that is neither current nor the one just created.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT current_gen FROM collections WHERE name = ?")
                .bind(index)
                .fetch_optional(&mut *tx)
                .await?;
        sqlx::query(
            r#"
            DELETE FROM chunks WHERE gen IN (
                SELECT id FROM generations
                WHERE collection = ? AND id != ? AND id != COALESCE(?, -1)
            )
            "#,
        )
        .bind(index)
        .bind(generation)
        .bind(current)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM generations WHERE collection = ? AND id != ? AND id != COALESCE(?, -1)",
        )
        .bind(index)
        .bind(generation)
        .bind(current)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

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
        let vectors = self.embed_in_batches(&texts).await?;

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks
                    (gen, id, text, origin, kind, chunk_index, total_chunks, source_id, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(handle.generation)
            .bind(&chunk.id)
            .bind(&chunk.text)
            .bind(&chunk.origin)
            .bind(chunk.kind.to_string())
            .bind(chunk.index as i64)
            .bind(chunk.total_chunks as i64)
            .bind(&chunk.source_id)
            .bind(embedding::vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn commit(&self, handle: IndexHandle) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let old: Option<i64> =
            sqlx::query_scalar("SELECT current_gen FROM collections WHERE name = ?")
                .bind(&handle.index)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, current_gen) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET current_gen = excluded.current_gen
            "#,
        )
        .bind(&handle.index)
        .bind(handle.generation)
        .execute(&mut *tx)
        .await?;

        if let Some(old_gen) = old {
            if old_gen != handle.generation {
                sqlx::query("DELETE FROM chunks WHERE gen = ?")
                    .bind(old_gen)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM generations WHERE id = ?")
                    .bind(old_gen)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn open(&self, index: &str) -> Result<IndexHandle> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT current_gen FROM collections WHERE name = ?")
                .bind(index)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            Some(generation) => Ok(IndexHandle {
                index: index.to_string(),
                generation,
            }),
            None => Err(Error::IndexNotFound(index.to_string())),
        }
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<StoredHit>> {
        let query_vec = self
            .embed_in_batches(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream {
                service: "embedding",
                reason: "empty embedding response".into(),
            })?;

        let rows = sqlx::query(
            r#"
            SELECT id, text, origin, kind, chunk_index, total_chunks, source_id, embedding
            FROM chunks WHERE gen = ?
            "#,
        )
        .bind(handle.generation)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_str: String = row.get("kind");
            let kind: SourceKind = kind_str.parse().map_err(|reason| Error::Upstream {
                service: "vector store",
                reason,
            })?;
            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            let distance = 1.0 - embedding::cosine_similarity(&query_vec, &vector) as f64;

            let chunk_index: i64 = row.get("chunk_index");
            let total_chunks: i64 = row.get("total_chunks");
            hits.push(StoredHit {
                id: row.get("id"),
                text: row.get("text"),
                origin: row.get("origin"),
                kind,
                index: chunk_index as usize,
                total_chunks: total_chunks as usize,
                source_id: row.get("source_id"),
                distance,
            });
        }

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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE gen = ?")
            .bind(handle.generation)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_if_exists(&self, index: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM chunks WHERE gen IN (SELECT id FROM generations WHERE collection = ?)",
        )
        .bind(index)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM generations WHERE collection = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
