//! Index statistics.
//!
//! A quick overview of what's indexed, used by `kb stats` and the HTTP
//! `/stats` route to confirm an ingestion run actually landed.

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::store::VectorStore;

/// Stats payload shared by the CLI and the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub index: String,
    pub chunks: u64,
}

/// Look up the committed index and count its chunks. Fails with
/// `IndexNotFound` when nothing has been ingested yet.
pub async fn index_stats(config: &Config, store: &dyn VectorStore) -> Result<IndexStats> {
    let handle = store.open(&config.store.index).await?;
    let chunks = store.count(&handle).await?;
    Ok(IndexStats {
        index: config.store.index.clone(),
        chunks,
    })
}

/// Print the stats summary for the CLI.
pub async fn run_stats(config: &Config, store: &dyn VectorStore) -> Result<()> {
    let stats = index_stats(config, store).await?;
    let db_size = std::fs::metadata(&config.store.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("ragbase — index stats");
    println!();
    println!("  Store:   {}", config.store.path.display());
    println!("  Size:    {}", format_bytes(db_size));
    println!("  Index:   {}", stats.index);
    println!("  Chunks:  {}", stats.chunks);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::memory::MemoryStore;
    use crate::store::test_support::{sample_chunk, TestEmbedder};

    fn test_config() -> Config {
        toml::from_str(
            r#"[store]
path = "unused.sqlite"
index = "kb"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stats_counts_committed_chunks() {
        let store = MemoryStore::new(Box::new(TestEmbedder));
        let handle = store.create_or_replace("kb").await.unwrap();
        store
            .add(
                &handle,
                &[sample_chunk("chunk_0", "alpha"), sample_chunk("chunk_1", "beta")],
            )
            .await
            .unwrap();
        store.commit(handle).await.unwrap();

        let stats = index_stats(&test_config(), &store).await.unwrap();
        assert_eq!(stats.index, "kb");
        assert_eq!(stats.chunks, 2);
    }

    #[tokio::test]
    async fn test_stats_without_index_is_not_found() {
        let store = MemoryStore::new(Box::new(TestEmbedder));
        let err = index_stats(&test_config(), &store).await.unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
