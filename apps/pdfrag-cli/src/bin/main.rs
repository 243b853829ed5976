use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use pdfrag_cli::{check_document, document_path, error_report, excerpt, init_tracing, load_settings};
use pdfrag_pipeline::{QueryCache, RagPipeline};

/// Answer a question about a PDF with local retrieval and generation.
#[derive(Parser, Debug)]
#[command(name = "pdfrag", version)]
struct Args {
    /// Document to query (defaults to demo.document_path)
    #[arg(long)]
    document: Option<PathBuf>,
    /// Question (defaults to demo.query)
    #[arg(long)]
    query: Option<String>,
    /// Write the pipeline graph as Graphviz DOT to this file
    #[arg(long)]
    graph: Option<PathBuf>,
    /// Delete all cached answers before running
    #[arg(long)]
    clear_cache: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", error_report(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let settings = load_settings()?;
    if args.clear_cache {
        let removed = QueryCache::new(settings.cache_dir())?.clear()?;
        println!("Removed {removed} cached answers");
    }

    let document = document_path(args.document, &settings);
    check_document(&document)?;
    let query = args.query.unwrap_or_else(|| settings.demo.query.clone());
    if query.trim().is_empty() {
        return Err(pdfrag_core::Error::EmptyQuery.into());
    }

    let pipeline = RagPipeline::from_settings(&settings)?.with_graph_output(args.graph);
    let state = pipeline.run(&document, &query)?;

    println!("\n{}", "=".repeat(50));
    println!("Question: {}", state.query);
    println!("\nAnswer: {}", state.answer.as_deref().unwrap_or("No answer could be generated."));
    println!("{}", "=".repeat(50));
    let documents = state.documents();
    if !documents.is_empty() {
        println!("\nReferences:");
        for (i, doc) in documents.iter().take(2).enumerate() {
            println!("\nDocument {} excerpt:", i + 1);
            println!("{}", excerpt(&doc.content));
        }
    }
    Ok(())
}
