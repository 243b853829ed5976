use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use pdfrag_cli::{check_document, document_path, excerpt, init_tracing, load_settings};
use pdfrag_core::traits::StoreLoader;
use pdfrag_embed::get_embedder;
use pdfrag_vector::DocumentLoader;

/// Retrieval only: print the chunks closest to a query.
#[derive(Parser, Debug)]
#[command(name = "pdfrag-search", version)]
struct Args {
    query: String,
    #[arg(long)]
    document: Option<PathBuf>,
    /// Number of chunks (defaults to retrieval.top_k)
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let document = document_path(args.document, &settings);
    check_document(&document)?;
    let limit = args.limit.unwrap_or(settings.retrieval.top_k);

    let embedder = Arc::from(get_embedder(&settings)?);
    let loader = DocumentLoader::new(&settings, embedder)?;
    let handle = loader.load_or_build(&document)?;
    let hits = handle.store.similarity_search(&args.query, limit)?;

    println!("Query: {}", args.query);
    println!("Found {} results", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let page = hit.metadata.page.map(|p| format!("p.{p}")).unwrap_or_else(|| "-".to_string());
        println!("\n{}. score={:.4} {} chunk={}", i + 1, hit.score.unwrap_or(0.0), page, hit.metadata.chunk_index);
        println!("   {}", excerpt(&hit.content));
    }
    Ok(())
}
