//! Embedding provider boundary.
//!
//! [`Embedder`] turns batches of text into fixed-dimension vectors for the
//! vector store. Two providers:
//! - **openai**: `POST /v1/embeddings` with a bounded request timeout.
//! - **disabled**: always errors; the default when no provider is set.
//!
//! Each call is a single attempt. Timeouts and transport failures surface
//! as retryable upstream errors; retry policy belongs to the caller.
//!
//! Also provides the vector utilities shared by the store backends:
//! [`cosine_similarity`], [`vec_to_blob`], and [`blob_to_vec`].

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts; one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Create the provider selected by the configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(Error::InvalidConfiguration(format!(
            "unknown embedding provider '{other}'; must be disabled or openai"
        ))),
    }
}

/// Placeholder provider used when embeddings are not configured. Any
/// attempt to embed fails with a descriptive error.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::InvalidConfiguration(
            "embedding provider is disabled; set [embedding] provider in the config".into(),
        ))
    }
}

/// Embedding provider backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment. The request timeout
/// comes from `embedding.timeout_secs`.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::InvalidConfiguration("embedding.model required for the openai provider".into())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::InvalidConfiguration("embedding.dims required for the openai provider".into())
        })?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::InvalidConfiguration("OPENAI_API_KEY environment variable not set".into())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Upstream {
                service: "embedding",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            model,
            dims,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest("embedding", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                service: "embedding",
                reason: format!("HTTP {status}: {body_text}"),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest("embedding", e))?;
        parse_embeddings(&json)
    }
}

/// Extract the `data[].embedding` arrays from an embeddings response,
/// preserving input order.
fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Upstream {
            service: "embedding",
            reason: "invalid response: missing data array".into(),
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Upstream {
                service: "embedding",
                reason: "invalid response: missing embedding".into(),
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`. Returns `0.0`
/// for empty or mismatched-length inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
