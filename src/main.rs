//! # ragbase CLI (`kb`)
//!
//! The `kb` binary is the primary interface for ragbase. It ingests local
//! and web documents into a vector-searchable knowledge base and answers
//! questions against it with cited sources.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb ingest` | Rebuild the index from the configured sources |
//! | `kb ask "<question>"` | Answer a question with cited sources |
//! | `kb ask` | Interactive question loop |
//! | `kb stats` | Show index name, chunk count, and store size |
//! | `kb serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild the index from data/markdown, data/pdf, and data/urls.txt
//! kb ingest
//!
//! # See what an ingest would do without writing anything
//! kb ingest --dry-run
//!
//! # One-shot question with citations
//! kb ask "How do I configure chunk overlap?"
//!
//! # Inspect the assembled prompt without calling the model
//! kb ask "What does the splitter do?" --context-only
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ragbase::config::{self, Config};
use ragbase::error::Error;
use ragbase::generate::{AnthropicGenerator, Generator};
use ragbase::models::{IngestReport, SourceOutcome, SourceSummary};
use ragbase::store::sqlite::SqliteStore;
use ragbase::store::VectorStore;
use ragbase::{assemble, ingest, query, server, stats};

/// Command-line interface for the ragbase knowledge base.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "ragbase — a local knowledge base with cited answers",
    version,
    long_about = "ragbase ingests markdown files, PDFs, and scraped web pages, splits them \
    into overlapping chunks, and indexes them for similarity search. Questions are answered \
    by retrieving the closest chunks, assembling a citation-annotated prompt, and calling \
    the generation service; answers cite sources by number."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from the configured sources.
    ///
    /// Walks the markdown and PDF directories and the urls file, chunks
    /// everything, and atomically replaces the previous index. Individual
    /// sources that fail or yield no text are reported and skipped.
    Ingest {
        /// Extract and chunk only; print counts without writing to the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a question against the indexed knowledge base.
    ///
    /// With a question argument: answers once and exits. Without one:
    /// starts an interactive loop (`quit` to leave). Retrieved sources
    /// are printed with similarity scores before the answer.
    Ask {
        /// The question. Omit to enter the interactive loop.
        question: Option<String>,

        /// Number of chunks to retrieve (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the assembled prompt instead of calling the model.
        #[arg(long)]
        context_only: bool,
    },

    /// Show index name, chunk count, and store size.
    Stats,

    /// Start the HTTP server (POST /query, GET /stats, GET /health).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { dry_run } => {
            if dry_run {
                let report = ingest::dry_run(&cfg).await?;
                print_report(&report, true);
            } else {
                let store = SqliteStore::from_config(&cfg).await?;
                let report = ingest::run_ingest(&cfg, &store).await?;
                print_report(&report, false);
                if report.is_empty() {
                    return Err(Error::EmptyIngestion.into());
                }
                println!("ok");
            }
        }
        Commands::Ask {
            question,
            top_k,
            context_only,
        } => {
            let store = SqliteStore::from_config(&cfg).await?;
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            match question {
                Some(question) => {
                    ask_once(&cfg, &store, &question, top_k, context_only).await?;
                }
                None => interactive_loop(&cfg, &store, top_k, context_only).await?,
            }
        }
        Commands::Stats => {
            let store = SqliteStore::from_config(&cfg).await?;
            stats::run_stats(&cfg, &store).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Answer one question: print the retrieved sources, then either the
/// assembled prompt (`--context-only`) or the generated answer.
async fn ask_once(
    cfg: &Config,
    store: &dyn VectorStore,
    question: &str,
    top_k: usize,
    context_only: bool,
) -> Result<()> {
    println!("Searching: '{question}'");
    let (cited, ranked) = query::build_query_context(cfg, store, question, top_k).await?;
    let summaries = assemble::source_summaries(&ranked, cfg.retrieval.preview_chars);
    print_sources(&summaries);

    if context_only {
        println!("{}", cited.prompt);
        return Ok(());
    }

    // The generator is only constructed once retrieval has succeeded, so
    // a missing index fails before a missing API key does.
    let generator = AnthropicGenerator::new(&cfg.generation)?;
    println!("Asking the model with context...\n");
    let answer = generator
        .generate(&cited.prompt, cfg.generation.max_tokens)
        .await?;
    println!("{answer}");
    Ok(())
}

/// Interactive question loop. Errors print a short diagnostic and the
/// loop continues; `quit`, `exit`, or `q` leaves.
async fn interactive_loop(
    cfg: &Config,
    store: &dyn VectorStore,
    top_k: usize,
    context_only: bool,
) -> Result<()> {
    println!("ragbase — interactive query (type 'quit' to leave)\n");
    let stdin = std::io::stdin();
    loop {
        print!("Your question: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "quit" | "exit" | "q") {
            break;
        }

        if let Err(e) = ask_once(cfg, store, question, top_k, context_only).await {
            eprintln!("error: {e}");
        }
        println!();
    }
    Ok(())
}

fn print_report(report: &IngestReport, dry_run: bool) {
    if dry_run {
        println!("ingest (dry-run)");
    } else {
        println!("ingest run {}", report.run_id);
    }
    for source in &report.sources {
        match &source.outcome {
            SourceOutcome::Ingested { chunks } => {
                println!("  ok      [{}] {} ({chunks} chunks)", source.kind, source.origin)
            }
            SourceOutcome::Skipped { reason } => {
                println!("  skipped [{}] {} ({reason})", source.kind, source.origin)
            }
            SourceOutcome::Failed { reason } => {
                println!("  failed  [{}] {} ({reason})", source.kind, source.origin)
            }
        }
    }
    println!(
        "  sources: {} ({} ingested, {} skipped, {} failed)",
        report.sources.len(),
        report.ingested(),
        report.skipped(),
        report.failed()
    );
    if dry_run {
        println!("  estimated chunks: {}", report.chunks_written);
    } else {
        println!("  chunks written: {}", report.chunks_written);
    }
}

fn print_sources(summaries: &[SourceSummary]) {
    println!("\nRetrieved {} relevant chunks:\n", summaries.len());
    for (i, summary) in summaries.iter().enumerate() {
        println!(
            "{}. [{}] {} (chunk {})",
            i + 1,
            summary.kind.to_string().to_uppercase(),
            summary.origin,
            summary.position
        );
        println!("   Similarity: {}", summary.similarity);
        println!("   Preview: {}...", summary.preview.replace('\n', " "));
        println!();
    }
}
