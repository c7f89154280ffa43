//! Ingestion pipeline orchestration.
//!
//! Walks the configured source locations (markdown directory, PDF
//! directory, urls file), extracts text, splits it into overlapping
//! chunks with provenance metadata, and replaces the vector index with
//! the new chunk set. Each source gets an explicit per-source outcome in
//! the returned [`IngestReport`]; one bad source never aborts the run.
//!
//! The index swap is all-or-nothing: chunks are staged into a fresh
//! generation and become visible only at commit. A run that fails or is
//! cancelled before commit leaves the previously published index intact.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use globset::Glob;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::loader;
use crate::models::{
    Chunk, IngestReport, SourceDocument, SourceKind, SourceOutcome, SourceReport,
};
use crate::splitter::Splitter;
use crate::store::VectorStore;

/// Run the full pipeline and atomically replace the configured index.
///
/// Returns the per-source run report. When no source produces any chunks
/// the report comes back with `chunks_written == 0` and the store is left
/// completely untouched; callers surface that as [`Error::EmptyIngestion`].
/// A failure in the staging or commit step is fatal and propagates.
pub async fn run_ingest(config: &Config, store: &dyn VectorStore) -> Result<IngestReport> {
    let (chunks, mut report) = collect_chunks(config).await?;

    if chunks.is_empty() {
        report.finished_at = Utc::now();
        return Ok(report);
    }

    let handle = store.create_or_replace(&config.store.index).await?;
    store.add(&handle, &chunks).await?;
    store.commit(handle).await?;

    report.chunks_written = chunks.len() as u64;
    report.finished_at = Utc::now();
    Ok(report)
}

/// Extraction and splitting only: counts what a real run would write
/// without touching the store.
pub async fn dry_run(config: &Config) -> Result<IngestReport> {
    let (chunks, mut report) = collect_chunks(config).await?;
    report.chunks_written = chunks.len() as u64;
    report.finished_at = Utc::now();
    Ok(report)
}

/// Discover sources, extract their text, and split everything into
/// chunks. Chunk ids are `chunk_{n}` with a counter that increments in
/// strict emission order across the whole run.
async fn collect_chunks(config: &Config) -> Result<(Vec<Chunk>, IngestReport)> {
    let splitter = Splitter::new(config.chunking.chunk_size, config.chunking.overlap)?;
    let scrape_timeout = Duration::from_secs(config.sources.scrape_timeout_secs);

    let mut report = IngestReport {
        run_id: Uuid::new_v4(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        sources: Vec::new(),
        chunks_written: 0,
    };

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut counter: u64 = 0;

    for (kind, origin) in discover_sources(config)? {
        let loaded = match kind {
            SourceKind::Markdown => loader::load_markdown(Path::new(&origin)),
            SourceKind::Pdf => loader::load_pdf(Path::new(&origin)),
            SourceKind::Web => Ok(loader::scrape_web(&origin, scrape_timeout).await),
        };

        let text = match loaded {
            Ok(text) => text,
            Err(e) => {
                report.sources.push(SourceReport {
                    origin,
                    kind,
                    outcome: SourceOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        if text.trim().is_empty() {
            report.sources.push(SourceReport {
                origin,
                kind,
                outcome: SourceOutcome::Skipped {
                    reason: "no text extracted".into(),
                },
            });
            continue;
        }

        let source = SourceDocument::new(kind, origin, text);
        let pieces = splitter.split(&source.text);
        let total_chunks = pieces.len();
        for (index, piece) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                id: format!("chunk_{counter}"),
                text: piece,
                index,
                total_chunks,
                source_id: source.source_id.clone(),
                kind: source.kind,
                origin: source.origin.clone(),
            });
            counter += 1;
        }

        report.sources.push(SourceReport {
            origin: source.origin,
            kind: source.kind,
            outcome: SourceOutcome::Ingested {
                chunks: total_chunks,
            },
        });
    }

    Ok((chunks, report))
}

/// Enumerate sources in a fixed order: markdown files, then PDFs, then
/// URLs. Directory listings are sorted so runs are deterministic.
fn discover_sources(config: &Config) -> Result<Vec<(SourceKind, String)>> {
    let mut sources = Vec::new();
    sources.extend(walk_files(
        &config.sources.markdown_dir,
        "**/*.md",
        SourceKind::Markdown,
    )?);
    sources.extend(walk_files(&config.sources.pdf_dir, "**/*.pdf", SourceKind::Pdf)?);
    for url in loader::read_urls_file(&config.sources.urls_file)? {
        sources.push((SourceKind::Web, url));
    }
    Ok(sources)
}

fn walk_files(root: &Path, pattern: &str, kind: SourceKind) -> Result<Vec<(SourceKind, String)>> {
    // Absent directories are simply empty, same as the urls file.
    if !root.exists() {
        return Ok(Vec::new());
    }

    let glob = Glob::new(pattern)
        .map_err(|e| Error::InvalidConfiguration(format!("bad glob pattern {pattern}: {e}")))?
        .compile_matcher();

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if glob.is_match(relative) {
            paths.push(entry.path().display().to_string());
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(|p| (kind, p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::test_support::TestEmbedder;
    use std::fs;

    fn test_config(root: &Path) -> Config {
        let toml_str = format!(
            r#"[store]
path = "{root}/kb.sqlite"
index = "kb"

[chunking]
chunk_size = 40
overlap = 10

[sources]
markdown_dir = "{root}/markdown"
pdf_dir = "{root}/pdf"
urls_file = "{root}/urls.txt"
"#,
            root = root.display()
        );
        toml::from_str(&toml_str).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Box::new(TestEmbedder))
    }

    #[tokio::test]
    async fn test_single_short_source_yields_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("note.md"), "Just a short note.").unwrap();

        let config = test_config(dir.path());
        let (chunks, report) = collect_chunks(&config).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].kind, SourceKind::Markdown);
        assert_eq!(report.ingested(), 1);
    }

    #[tokio::test]
    async fn test_indices_dense_and_ids_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(
            md.join("a.md"),
            "First paragraph with enough words to spill over.\n\nSecond paragraph also long enough to matter.",
        )
        .unwrap();
        fs::write(md.join("b.md"), "Tiny.").unwrap();

        let config = test_config(dir.path());
        let (chunks, _) = collect_chunks(&config).await.unwrap();

        for (n, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("chunk_{n}"));
        }
        for source_id in chunks.iter().map(|c| c.source_id.clone()) {
            let per_source: Vec<&Chunk> =
                chunks.iter().filter(|c| c.source_id == source_id).collect();
            let total = per_source[0].total_chunks;
            assert_eq!(per_source.len(), total);
            for (i, chunk) in per_source.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert_eq!(chunk.total_chunks, total);
            }
        }
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_failed_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        let pdf = dir.path().join("pdf");
        fs::create_dir_all(&md).unwrap();
        fs::create_dir_all(&pdf).unwrap();
        fs::write(md.join("good.md"), "Readable content here.").unwrap();
        fs::write(pdf.join("broken.pdf"), b"not a pdf").unwrap();

        let config = test_config(dir.path());
        let store = store();
        let report = run_ingest(&config, &store).await.unwrap();

        assert_eq!(report.ingested(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.chunks_written, 1);
        let reader = store.open("kb").await.unwrap();
        assert_eq!(store.count(&reader).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_markdown_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("blank.md"), "   \n\n  ").unwrap();
        fs::write(md.join("real.md"), "Actual words.").unwrap();

        let config = test_config(dir.path());
        let (chunks, report) = collect_chunks(&config).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.ingested(), 1);
    }

    #[tokio::test]
    async fn test_empty_run_leaves_prior_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("note.md"), "Persistent content.").unwrap();

        let config = test_config(dir.path());
        let store = store();
        let first = run_ingest(&config, &store).await.unwrap();
        assert_eq!(first.chunks_written, 1);

        // Second run over an emptied directory: nothing to ingest, and
        // the previously committed index must survive.
        fs::remove_file(md.join("note.md")).unwrap();
        let second = run_ingest(&config, &store).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.sources.len(), 0);

        let reader = store.open("kb").await.unwrap();
        assert_eq!(store.count(&reader).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_reingest_replaces_not_merges() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("a.md"), "Old content alpha.").unwrap();
        fs::write(md.join("b.md"), "Old content beta.").unwrap();

        let config = test_config(dir.path());
        let store = store();
        run_ingest(&config, &store).await.unwrap();

        fs::remove_file(md.join("b.md")).unwrap();
        run_ingest(&config, &store).await.unwrap();

        let reader = store.open("kb").await.unwrap();
        assert_eq!(store.count(&reader).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("note.md"), "Some content to count.").unwrap();

        let config = test_config(dir.path());
        let report = dry_run(&config).await.unwrap();
        assert_eq!(report.chunks_written, 1);
        assert_eq!(report.ingested(), 1);
    }

    #[tokio::test]
    async fn test_discovery_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("markdown");
        fs::create_dir_all(md.join("nested")).unwrap();
        fs::write(md.join("zeta.md"), "z").unwrap();
        fs::write(md.join("alpha.md"), "a").unwrap();
        fs::write(md.join("nested").join("mid.md"), "m").unwrap();

        let config = test_config(dir.path());
        let sources = discover_sources(&config).unwrap();
        let origins: Vec<&String> = sources.iter().map(|(_, o)| o).collect();
        let mut sorted = origins.clone();
        sorted.sort();
        assert_eq!(origins, sorted);
    }
}
