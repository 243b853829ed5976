//! LanceDB-backed vector stores, one per ingested document.

pub mod extract;
pub mod loader;
pub mod schema;
pub mod store;
pub mod table;
pub mod writer;

pub use extract::{extractor_for, PdfTextExtractor, PlainTextExtractor, TextExtractor};
pub use loader::{store_dir_name, DocumentLoader};
pub use store::LanceVectorStore;
