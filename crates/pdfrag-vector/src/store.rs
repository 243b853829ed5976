use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::sync::Arc;
use tokio::runtime::Runtime;

use pdfrag_core::traits::{Embedder, VectorStore};
use pdfrag_core::types::{DocumentMetadata, RetrievedDocument};

/// A LanceDB chunk table searched by cosine similarity.
pub struct LanceVectorStore {
    runtime: Arc<Runtime>,
    table: Table,
    embedder: Arc<dyn Embedder>,
}

impl LanceVectorStore {
    pub fn new(runtime: Arc<Runtime>, table: Table, embedder: Arc<dyn Embedder>) -> Self {
        Self { runtime, table, embedder }
    }

    pub fn count_rows(&self) -> Result<usize> {
        Ok(self.runtime.block_on(self.table.count_rows(None))?)
    }

    async fn search_vec(&self, query_vec: Vec<f32>, k: usize) -> Result<Vec<RetrievedDocument>> {
        let mut stream = self.table
            .vector_search(query_vec)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_documents(&batch)?);
        }
        Ok(hits)
    }
}

impl VectorStore for LanceVectorStore {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        if k == 0 || self.count_rows()? == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder
            .embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;
        let mut hits = self.runtime.block_on(self.search_vec(query_vec, k))?;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        tracing::debug!(k, hits = hits.len(), "similarity search");
        Ok(hits)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("search result has no usable '{}' column", name))
}

fn batch_to_documents(batch: &RecordBatch) -> Result<Vec<RetrievedDocument>> {
    let contents = column::<StringArray>(batch, "content")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<Int32Array>(batch, "page")?;
    let chunk_indices = column::<Int32Array>(batch, "chunk_index")?;
    let distances = column::<Float32Array>(batch, "_distance").ok();
    Ok((0..batch.num_rows())
        .map(|i| {
            let metadata = DocumentMetadata {
                source: sources.value(i).to_string(),
                page: if pages.is_null(i) { None } else { Some(pages.value(i) as u32) },
                chunk_index: chunk_indices.value(i) as usize,
            };
            let doc = RetrievedDocument::new(contents.value(i), metadata);
            match distances {
                Some(d) => doc.with_score(1.0 - d.value(i)),
                None => doc,
            }
        })
        .collect())
}
