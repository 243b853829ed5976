use anyhow::{anyhow, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;

use pdfrag_core::traits::Embedder;
use pdfrag_core::types::DocumentChunk;
use pdfrag_core::Error;

use crate::schema::build_chunk_schema;
use crate::table::{ensure_table, table_exists};

/// Embeds chunks batch by batch and appends them to one LanceDB table.
pub struct ChunkWriter<'a> {
	conn: &'a Connection,
	table_name: String,
	embedder: &'a dyn Embedder,
	batch_size: usize,
}

impl<'a> ChunkWriter<'a> {
	pub fn new(conn: &'a Connection, table_name: &str, embedder: &'a dyn Embedder, batch_size: usize) -> Self {
		Self { conn, table_name: table_name.to_string(), embedder, batch_size: batch_size.max(1) }
	}

	pub async fn write(&self, chunks: &[DocumentChunk]) -> Result<usize> {
		let schema = build_chunk_schema(self.embedder.dim());
		if chunks.is_empty() {
			tracing::warn!(table = %self.table_name, "no text extracted; creating empty table");
			ensure_table(self.conn, &self.table_name, schema).await?;
			return Ok(0);
		}
		tracing::info!(chunks = chunks.len(), table = %self.table_name, "embedding and indexing chunks");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(
			ProgressStyle::default_bar()
				.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
				.progress_chars("#>-"),
		);
		let mut written = 0usize;
		for batch in chunks.chunks(self.batch_size) {
			let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
			let embeddings = self.embedder.embed_batch(&texts)?;
			if embeddings.len() != batch.len() {
				return Err(Error::Operation(format!("embedder returned {} vectors for {} chunks", embeddings.len(), batch.len())).into());
			}
			self.insert_batch(to_record_batch(batch, &embeddings, self.embedder.dim())?).await?;
			written += batch.len();
			pb.set_position(written as u64);
		}
		pb.finish_with_message("done");
		tracing::info!(chunks = written, table = %self.table_name, "indexed chunks");
		Ok(written)
	}

	async fn insert_batch(&self, record_batch: RecordBatch) -> Result<()> {
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if table_exists(self.conn, &self.table_name).await? {
			self.conn.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.conn.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}
}

fn to_record_batch(chunks: &[DocumentChunk], embeddings: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) {
		return Err(anyhow!("embedding has {} dimensions, expected {}", bad.len(), dim));
	}
	let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
	let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
	let pages: Vec<Option<i32>> = chunks.iter().map(|c| c.page.map(|p| p as i32)).collect();
	let chunk_indices: Vec<i32> = chunks.iter().map(|c| c.chunk_index as i32).collect();
	let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
	let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	Ok(RecordBatch::try_new(build_chunk_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(sources)),
		Arc::new(Int32Array::from(pages)),
		Arc::new(Int32Array::from(chunk_indices)),
		Arc::new(StringArray::from(contents)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
	])?)
}
