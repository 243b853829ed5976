use anyhow::Result;
use std::sync::Arc;

use pdfrag_core::traits::VectorStore;
use pdfrag_core::PipelineState;

use crate::graph::{PipelineNode, PipelineStage};

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    /// Fill `documents` with the store's top-k chunks for the state's query.
    pub fn retrieve(&self, state: PipelineState) -> Result<PipelineState> {
        let documents = self.store.similarity_search(&state.query, self.top_k)?;
        tracing::debug!(top_k = self.top_k, found = documents.len(), "retrieved documents");
        Ok(state.with_documents(documents))
    }
}

impl PipelineNode for Retriever {
    fn name(&self) -> &'static str { "doc_retriever" }
    fn stage(&self) -> PipelineStage { PipelineStage::Retrieved }
    fn run(&self, state: PipelineState) -> Result<PipelineState> { self.retrieve(state) }
}
