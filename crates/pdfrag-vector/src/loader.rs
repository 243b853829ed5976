use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::runtime::Runtime;

use pdfrag_core::config::RagSettings;
use pdfrag_core::data_processor::{ChunkingConfig, DataProcessor};
use pdfrag_core::hashing::md5_hex;
use pdfrag_core::traits::{Embedder, StoreLoader, VectorStoreHandle};
use pdfrag_core::Error;

use crate::extract::{extractor_for, TextExtractor};
use crate::store::LanceVectorStore;
use crate::table::{open_db, open_table};
use crate::writer::ChunkWriter;

/// Directory (and table) name for a source file: sanitized stem plus the
/// MD5 of its bytes, so edited files get a fresh store.
pub fn store_dir_name(path: &Path, bytes: &[u8]) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("document");
    }
    format!("{}_{}", name, md5_hex(bytes))
}

type EmbedderFactory = Box<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Builds one LanceDB store per distinct source file under `root`, or
/// reopens it when the same bytes were indexed before.
pub struct DocumentLoader {
    root: PathBuf,
    embedder: Mutex<Option<Arc<dyn Embedder>>>,
    factory: Option<EmbedderFactory>,
    processor: DataProcessor,
    batch_size: usize,
    extractor: Option<Arc<dyn TextExtractor>>,
    runtime: Arc<Runtime>,
}

impl DocumentLoader {
    pub fn new(settings: &RagSettings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_parts(settings, Some(embedder), None)
    }

    /// Defer creating the embedder until the first `load_or_build`.
    pub fn lazy<F>(settings: &RagSettings, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        Self::with_parts(settings, None, Some(Box::new(factory)))
    }

    fn with_parts(settings: &RagSettings, embedder: Option<Arc<dyn Embedder>>, factory: Option<EmbedderFactory>) -> Result<Self> {
        Ok(Self {
            root: settings.vector_db_dir(),
            embedder: Mutex::new(embedder),
            factory,
            processor: DataProcessor::new(ChunkingConfig::from(&settings.chunking)),
            batch_size: settings.embedding.batch_size,
            extractor: None,
            runtime: Arc::new(Runtime::new()?),
        })
    }

    /// Use `extractor` for every file instead of choosing by extension.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn embedder_loaded(&self) -> bool {
        self.embedder.lock().map(|e| e.is_some()).unwrap_or(false)
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let mut guard = self.embedder.lock().map_err(|_| anyhow!("embedder lock poisoned"))?;
        if let Some(embedder) = guard.as_ref() {
            return Ok(embedder.clone());
        }
        let factory = self.factory.as_ref().ok_or_else(|| anyhow!("no embedder configured"))?;
        let embedder = factory()?;
        *guard = Some(embedder.clone());
        Ok(embedder)
    }

    fn open_existing(&self, dir: &Path, name: &str) -> Result<LanceVectorStore> {
        let table = self.runtime.block_on(async {
            let conn = open_db(dir).await?;
            open_table(&conn, name).await
        }).with_context(|| format!("Failed to open vector store {}", dir.display()))?;
        Ok(LanceVectorStore::new(self.runtime.clone(), table, self.embedder()?))
    }

    fn build(&self, source: &Path, dir: &Path, name: &str) -> Result<LanceVectorStore> {
        let start = Instant::now();
        let embedder = self.embedder()?;
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let extractor = match &self.extractor {
            Some(e) => e.clone(),
            None => extractor_for(source),
        };
        let pages = extractor.extract(source)?;
        let chunks = self.processor.process_pages(source, &pages);
        tracing::info!(pages = pages.len(), chunks = chunks.len(), "extracted and split document");

        let table = self.runtime.block_on(async {
            let conn = open_db(dir).await?;
            ChunkWriter::new(&conn, name, embedder.as_ref(), self.batch_size).write(&chunks).await?;
            open_table(&conn, name).await
        })?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "built vector store");
        Ok(LanceVectorStore::new(self.runtime.clone(), table, embedder))
    }
}

impl StoreLoader for DocumentLoader {
    fn load_or_build(&self, path: &Path) -> Result<VectorStoreHandle> {
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()).into());
        }
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = store_dir_name(path, &bytes);
        let dir = self.root.join(&name);
        let store = if dir.exists() {
            tracing::info!(store = %dir.display(), "reusing vector store");
            self.open_existing(&dir, &name)?
        } else {
            tracing::info!(store = %dir.display(), "building vector store");
            self.build(path, &dir, &name)?
        };
        Ok(VectorStoreHandle { path: dir, collection: name, store: Arc::new(store) })
    }
}
