//! Domain types shared by the loader, the vector store and the pipeline.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;
pub type Feedback = serde_json::Map<String, serde_json::Value>;

/// A chunk of a source document produced at ingestion time.
///
/// - `id`: `{stem}:{page}:{chunk_index}`, unique within one store
/// - `source`: original path of the ingested file
/// - `page`: 1-based page number when the extractor knows pages
/// - `chunk_index`: position of the chunk within the whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
}

/// A chunk returned by similarity search. `score` is higher-is-better
/// when the store reports one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub score: Option<f32>,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self { content: content.into(), metadata, score: None }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

impl From<DocumentChunk> for RetrievedDocument {
    fn from(chunk: DocumentChunk) -> Self {
        Self {
            content: chunk.content,
            metadata: DocumentMetadata { source: chunk.source, page: chunk.page, chunk_index: chunk.chunk_index },
            score: None,
        }
    }
}

/// State threaded through the pipeline nodes.
///
/// Each node consumes the state and hands back the same record with its own
/// field filled in; the `with_*` updaters never touch other fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub query: String,
    #[serde(default)]
    pub documents: Option<Vec<RetrievedDocument>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn with_documents(self, documents: Vec<RetrievedDocument>) -> Self {
        Self { documents: Some(documents), ..self }
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self { context: Some(context.into()), ..self }
    }

    pub fn with_answer(self, answer: impl Into<String>) -> Self {
        Self { answer: Some(answer.into()), ..self }
    }

    pub fn with_feedback(self, feedback: Feedback) -> Self {
        Self { feedback: Some(feedback), ..self }
    }

    pub fn documents(&self) -> &[RetrievedDocument] {
        self.documents.as_deref().unwrap_or(&[])
    }
}
