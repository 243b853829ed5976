//! Query pipeline: cache, retrieval, context assembly and answer generation.

pub mod cache;
pub mod context;
pub mod graph;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;

pub use cache::{cache_key, QueryCache};
pub use context::ContextBuilder;
pub use graph::{AnswerGenerator, PipelineNode, PipelineStage, RagGraph};
pub use orchestrator::RagPipeline;
pub use prompt::PromptTemplate;
pub use retriever::Retriever;
