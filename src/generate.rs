//! Generation service boundary.
//!
//! [`Generator`] turns an assembled prompt into answer text. The shipped
//! implementation calls the Anthropic Messages API with a bounded request
//! timeout. Every call is a single attempt; failures surface to the
//! caller, which owns any retry policy.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer for `prompt`, bounded by `max_tokens`.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Generator backed by the Anthropic Messages API.
///
/// Requires `ANTHROPIC_API_KEY` in the environment. The request timeout
/// comes from `generation.timeout_secs`.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl AnthropicGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            Error::InvalidConfiguration("ANTHROPIC_API_KEY environment variable not set".into())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Upstream {
                service: "generation",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest("generation", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                service: "generation",
                reason: format!("HTTP {status}: {body_text}"),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest("generation", e))?;
        parse_answer(&json)
    }
}

/// Extract the first text block from a Messages API response.
fn parse_answer(json: &serde_json::Value) -> Result<String> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| blocks.iter().find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text")))
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Upstream {
            service: "generation",
            reason: "invalid response: no text content block".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_extracts_text_block() {
        let json = serde_json::json!({
            "content": [
                { "type": "text", "text": "According to Source 1, it works." }
            ]
        });
        assert_eq!(
            parse_answer(&json).unwrap(),
            "According to Source 1, it works."
        );
    }

    #[test]
    fn test_parse_answer_skips_non_text_blocks() {
        let json = serde_json::json!({
            "content": [
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "Answer." }
            ]
        });
        assert_eq!(parse_answer(&json).unwrap(), "Answer.");
    }

    #[test]
    fn test_parse_answer_rejects_missing_content() {
        let json = serde_json::json!({ "id": "msg_123" });
        let err = parse_answer(&json).unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }
}
