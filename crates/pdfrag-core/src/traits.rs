use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::RetrievedDocument;

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub trait VectorStore: Send + Sync {
    /// Top-`k` chunks for `query`, most relevant first.
    fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedDocument>>;
}

/// An opened (or freshly built) store for one source file.
#[derive(Clone)]
pub struct VectorStoreHandle {
    pub path: PathBuf,
    pub collection: String,
    pub store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for VectorStoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreHandle").field("path", &self.path).field("collection", &self.collection).finish()
    }
}

pub trait StoreLoader: Send + Sync {
    fn load_or_build(&self, path: &Path) -> anyhow::Result<VectorStoreHandle>;
}
