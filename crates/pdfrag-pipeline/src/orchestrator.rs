use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use pdfrag_core::config::RagSettings;
use pdfrag_core::traits::{Embedder, Generator, StoreLoader, VectorStore};
use pdfrag_core::{Error, PipelineState};
use pdfrag_embed::get_embedder;
use pdfrag_llm::get_generator;
use pdfrag_vector::DocumentLoader;

use crate::cache::QueryCache;
use crate::context::ContextBuilder;
use crate::graph::{AnswerGenerator, RagGraph};
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;

/// Cache lookup, store loading and the retrieve/context/answer graph.
pub struct RagPipeline {
    settings: RagSettings,
    cache: QueryCache,
    loader: Arc<dyn StoreLoader>,
    generator: Arc<dyn Generator>,
    prompt: PromptTemplate,
    graph_output: Option<PathBuf>,
}

impl RagPipeline {
    pub fn new(settings: RagSettings, loader: Arc<dyn StoreLoader>, generator: Arc<dyn Generator>) -> Result<Self> {
        let cache = QueryCache::new(settings.cache_dir())?;
        let prompt = PromptTemplate::new(settings.prompt.template.clone());
        Ok(Self { settings, cache, loader, generator, prompt, graph_output: None })
    }

    /// Wire the configured embedder, LanceDB loader and generator. Both
    /// models load on first use, so a cache hit never touches them.
    pub fn from_settings(settings: &RagSettings) -> Result<Self> {
        let embed_settings = settings.clone();
        let loader = DocumentLoader::lazy(settings, move || {
            let embedder: Arc<dyn Embedder> = Arc::from(get_embedder(&embed_settings).context("Failed to initialise embedder")?);
            Ok(embedder)
        })?;
        let generator = Arc::from(get_generator(settings));
        Self::new(settings.clone(), Arc::new(loader), generator)
    }

    /// Write the graph as Graphviz DOT to `path` whenever it is built.
    pub fn with_graph_output(mut self, path: Option<PathBuf>) -> Self {
        self.graph_output = path;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn graph(&self, store: Arc<dyn VectorStore>) -> RagGraph {
        RagGraph::new(vec![
            Box::new(Retriever::new(store, self.settings.retrieval.top_k)),
            Box::new(ContextBuilder::from(&self.settings.context)),
            Box::new(AnswerGenerator::new(self.generator.clone(), self.prompt.clone())),
        ])
    }

    pub fn run(&self, document_path: &Path, query: &str) -> Result<PipelineState> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery.into());
        }
        let start = Instant::now();
        if let Some(state) = self.cache.get::<PipelineState>(query)? {
            tracing::info!("cache hit");
            return Ok(state);
        }

        let load_start = Instant::now();
        let handle = self.loader.load_or_build(document_path)?;
        tracing::info!(collection = %handle.collection, elapsed_ms = load_start.elapsed().as_millis() as u64, "vector store ready");

        let graph = self.graph(handle.store);
        if let Some(path) = &self.graph_output {
            write_graph(&graph, path);
        }
        let state = graph.invoke(PipelineState::new(query))?;
        self.cache.put(query, &state)?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "pipeline finished");
        Ok(state)
    }
}

fn write_graph(graph: &RagGraph, path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %path.display(), error = %e, "could not create graph output directory");
            return;
        }
    }
    match std::fs::write(path, graph.to_dot()) {
        Ok(()) => tracing::info!(path = %path.display(), "wrote pipeline graph"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not write pipeline graph"),
    }
}
