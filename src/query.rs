//! Query orchestration shared by the CLI and the HTTP server.
//!
//! Retrieval and context assembly are separated from the generation call
//! so callers can show sources before (or instead of) generating.

use serde::Serialize;

use crate::assemble;
use crate::config::Config;
use crate::error::Result;
use crate::generate::Generator;
use crate::models::{CitedContext, RetrievedChunk, SourceSummary};
use crate::retriever;
use crate::store::VectorStore;

/// Answer plus the structured source list, with citation numbers aligned
/// between the two.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceSummary>,
}

/// Retrieve and assemble the cited context for a question without
/// calling the generation service.
pub async fn build_query_context(
    config: &Config,
    store: &dyn VectorStore,
    question: &str,
    top_k: usize,
) -> Result<(CitedContext, Vec<RetrievedChunk>)> {
    let ranked = retriever::retrieve(store, &config.store.index, question, top_k).await?;
    let cited = assemble::assemble(&ranked, question);
    Ok((cited, ranked))
}

/// Full pipeline: retrieve, assemble, generate. `preview_chars` bounds
/// the per-source text preview in the response.
pub async fn answer_question(
    config: &Config,
    store: &dyn VectorStore,
    generator: &dyn Generator,
    question: &str,
    top_k: usize,
    preview_chars: usize,
) -> Result<QueryResponse> {
    let (cited, ranked) = build_query_context(config, store, question, top_k).await?;
    let answer = generator
        .generate(&cited.prompt, config.generation.max_tokens)
        .await?;

    Ok(QueryResponse {
        answer,
        sources: assemble::source_summaries(&ranked, preview_chars),
    })
}
