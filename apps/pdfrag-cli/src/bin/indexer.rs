use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use pdfrag_cli::{check_document, init_tracing, load_settings};
use pdfrag_core::traits::StoreLoader;
use pdfrag_embed::get_embedder;
use pdfrag_vector::DocumentLoader;

/// Build (or reuse) the vector store for a document.
#[derive(Parser, Debug)]
#[command(name = "pdfrag-index", version)]
struct Args {
    document: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    check_document(&args.document)?;

    let embedder = Arc::from(get_embedder(&settings)?);
    let loader = DocumentLoader::new(&settings, embedder)?;
    let handle = loader.load_or_build(&args.document)?;
    println!("Vector store: {}", handle.path.display());
    println!("Collection:   {}", handle.collection);
    Ok(())
}
