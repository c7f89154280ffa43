//! Citation-annotated context assembly.
//!
//! Pure functions from ranked chunks to the generation prompt and the
//! structured source list. No I/O, so everything here is unit-testable
//! without a store or a generation service. Nothing is dropped,
//! deduplicated, or reordered: citation numbers equal retrieval ranks,
//! and any dedup policy belongs to the caller.

use crate::models::{CitedContext, RetrievedChunk, SourceSummary};

/// Separator between citation blocks in the context.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Build the citation blocks, joined context, and final prompt for a
/// question. Deterministic given identical ranked input; the question
/// appears verbatim in the prompt.
pub fn assemble(ranked: &[RetrievedChunk], question: &str) -> CitedContext {
    let blocks: Vec<String> = ranked
        .iter()
        .map(|rc| {
            format!(
                "[Source {}: {}, {}]\n{}",
                rc.rank, rc.chunk.origin, rc.chunk.kind, rc.chunk.text
            )
        })
        .collect();
    let context_block = blocks.join(BLOCK_SEPARATOR);

    let prompt = format!(
        "Answer the following question using only the provided context from my documentation. \
         When referencing information, cite the source number (e.g., \"According to Source 1...\").\n\n\
         Question: {question}\n\n\
         Context:\n{context_block}\n\n\
         Provide a comprehensive answer with source citations."
    );

    CitedContext {
        entries: ranked
            .iter()
            .map(|rc| (rc.rank, rc.chunk.clone()))
            .collect(),
        context_block,
        prompt,
    }
}

/// One display row per ranked chunk, in rank order. `preview_chars`
/// bounds the text preview; CLI and HTTP callers pass their own limits.
pub fn source_summaries(ranked: &[RetrievedChunk], preview_chars: usize) -> Vec<SourceSummary> {
    ranked
        .iter()
        .map(|rc| SourceSummary {
            origin: rc.chunk.origin.clone(),
            kind: rc.chunk.kind,
            position: format!("{}/{}", rc.chunk.index + 1, rc.chunk.total_chunks),
            similarity: format!("{:.1}%", rc.score * 100.0),
            preview: rc.chunk.text.chars().take(preview_chars).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, SourceKind};

    fn ranked_fixture() -> Vec<RetrievedChunk> {
        let mk = |rank: usize, origin: &str, kind: SourceKind, text: &str, score: f64| {
            RetrievedChunk {
                chunk: Chunk {
                    id: format!("chunk_{rank}"),
                    text: text.to_string(),
                    index: rank - 1,
                    total_chunks: 3,
                    source_id: format!("source-{origin}"),
                    kind,
                    origin: origin.to_string(),
                },
                score,
                rank,
            }
        };
        vec![
            mk(1, "data/markdown/notes.md", SourceKind::Markdown, "First chunk text.", 0.873),
            mk(2, "https://example.com/page", SourceKind::Web, "Second chunk text.", 0.51),
            mk(3, "data/pdf/manual.pdf", SourceKind::Pdf, "Third chunk text.", 0.2),
        ]
    }

    #[test]
    fn test_one_block_per_chunk_with_rank_numbers() {
        let cited = assemble(&ranked_fixture(), "How does it work?");
        assert!(cited
            .context_block
            .contains("[Source 1: data/markdown/notes.md, markdown]\nFirst chunk text."));
        assert!(cited
            .context_block
            .contains("[Source 2: https://example.com/page, web]\nSecond chunk text."));
        assert!(cited
            .context_block
            .contains("[Source 3: data/pdf/manual.pdf, pdf]\nThird chunk text."));
        assert_eq!(cited.context_block.matches("[Source ").count(), 3);
    }

    #[test]
    fn test_prompt_contains_question_verbatim() {
        let question = "What is the exact behavior of `split --overlap`?";
        let cited = assemble(&ranked_fixture(), question);
        assert!(cited.prompt.contains(question));
        assert!(cited.prompt.contains(&cited.context_block));
    }

    #[test]
    fn test_citation_numbers_equal_ranks_and_stay_in_order() {
        let ranked = ranked_fixture();
        let cited = assemble(&ranked, "q");
        assert_eq!(cited.entries.len(), ranked.len());
        for (entry, rc) in cited.entries.iter().zip(ranked.iter()) {
            assert_eq!(entry.0, rc.rank);
            assert_eq!(entry.1.id, rc.chunk.id);
        }
    }

    #[test]
    fn test_no_chunk_dropped_even_for_duplicate_sources() {
        let mut ranked = ranked_fixture();
        ranked[1].chunk.origin = ranked[0].chunk.origin.clone();
        ranked[1].chunk.source_id = ranked[0].chunk.source_id.clone();
        let cited = assemble(&ranked, "q");
        assert_eq!(cited.entries.len(), 3);
        assert_eq!(cited.context_block.matches("[Source ").count(), 3);
    }

    #[test]
    fn test_deterministic() {
        let ranked = ranked_fixture();
        let a = assemble(&ranked, "same question");
        let b = assemble(&ranked, "same question");
        assert_eq!(a.prompt, b.prompt);
        assert_eq!(a.context_block, b.context_block);
    }

    #[test]
    fn test_empty_ranked_input() {
        let cited = assemble(&[], "lonely question");
        assert!(cited.entries.is_empty());
        assert!(cited.context_block.is_empty());
        assert!(cited.prompt.contains("lonely question"));
    }

    #[test]
    fn test_summaries_format_position_similarity_preview() {
        let summaries = source_summaries(&ranked_fixture(), 5);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].position, "1/3");
        assert_eq!(summaries[0].similarity, "87.3%");
        assert_eq!(summaries[0].preview, "First");
        assert_eq!(summaries[1].position, "2/3");
        assert_eq!(summaries[1].similarity, "51.0%");
        assert_eq!(summaries[2].kind, SourceKind::Pdf);
    }

    #[test]
    fn test_preview_bound_respects_char_boundaries() {
        let mut ranked = ranked_fixture();
        ranked[0].chunk.text = "héllö wörld with accents".to_string();
        let summaries = source_summaries(&ranked, 7);
        assert_eq!(summaries[0].preview, "héllö w");
    }
}
