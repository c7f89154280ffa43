use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite database file backing the vector index.
    pub path: PathBuf,
    /// Name of the index (collection) replaced wholesale on each ingest.
    #[serde(default = "default_index")]
    pub index: String,
}

fn default_index() -> String {
    "knowledge_base".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Preview length for CLI source listings.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Preview length for the structured source summary (HTTP responses).
    #[serde(default = "default_summary_preview_chars")]
    pub summary_preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            preview_chars: default_preview_chars(),
            summary_preview_chars: default_summary_preview_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_preview_chars() -> usize {
    150
}
fn default_summary_preview_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_markdown_dir")]
    pub markdown_dir: PathBuf,
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    /// One URL per line; blank lines and `#` comments ignored. Optional.
    #[serde(default = "default_urls_file")]
    pub urls_file: PathBuf,
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            markdown_dir: default_markdown_dir(),
            pdf_dir: default_pdf_dir(),
            urls_file: default_urls_file(),
            scrape_timeout_secs: default_scrape_timeout(),
        }
    }
}

fn default_markdown_dir() -> PathBuf {
    PathBuf::from("data/markdown")
}
fn default_pdf_dir() -> PathBuf {
    PathBuf::from("data/pdf")
}
fn default_urls_file() -> PathBuf {
    PathBuf::from("data/urls.txt")
}
fn default_scrape_timeout() -> u64 {
    20
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfiguration(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::InvalidConfiguration(format!("failed to parse config file: {e}")))?;

    validate(&config)?;
    Ok(config)
}

/// Reject degenerate parameters before any work begins.
fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::InvalidConfiguration(
            "chunking.chunk_size must be > 0".into(),
        ));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(Error::InvalidConfiguration(format!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap, config.chunking.chunk_size
        )));
    }
    if config.retrieval.top_k < 1 {
        return Err(Error::InvalidConfiguration(
            "retrieval.top_k must be >= 1".into(),
        ));
    }
    if config.store.index.trim().is_empty() {
        return Err(Error::InvalidConfiguration(
            "store.index must not be empty".into(),
        ));
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => {
            return Err(Error::InvalidConfiguration(format!(
                "unknown embedding provider '{other}'; must be disabled or openai"
            )))
        }
    }
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "embedding.model must be set when provider is '{}'",
                config.embedding.provider
            )));
        }
        match config.embedding.dims {
            None | Some(0) => {
                return Err(Error::InvalidConfiguration(format!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                )))
            }
            Some(_) => {}
        }
    }
    if config.generation.max_tokens == 0 {
        return Err(Error::InvalidConfiguration(
            "generation.max_tokens must be > 0".into(),
        ));
    }
    Ok(())
}
