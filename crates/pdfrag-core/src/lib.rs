pub mod config;
pub mod data_processor;
pub mod error;
pub mod hashing;
pub mod traits;
pub mod types;

pub use config::{Config, RagSettings};
pub use error::Error;
pub use traits::{Embedder, Generator, StoreLoader, VectorStore, VectorStoreHandle};
pub use types::{DocumentChunk, DocumentMetadata, PipelineState, RetrievedDocument};
