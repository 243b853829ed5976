//! LanceDB connection and table helpers.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection, Table};
use std::path::Path;
use std::sync::Arc;

pub async fn open_db(dir: &Path) -> Result<Connection> {
    Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create `name` with zero rows unless it already exists.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub async fn open_table(conn: &Connection, name: &str) -> Result<Table> {
    Ok(conn.open_table(name).execute().await?)
}
