use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use pdfrag_core::hashing::md5_hex;

/// On-disk JSON cache keyed by the MD5 of the query text.
///
/// One file per entry, no eviction and no expiry. The document is not part
/// of the key, so the same question asked of two documents shares an entry.
#[derive(Debug, Clone)]
pub struct QueryCache {
    dir: PathBuf,
}

pub fn cache_key(query: &str) -> String {
    md5_hex(query.as_bytes())
}

impl QueryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, query: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(query)))
    }

    pub fn get<T: DeserializeOwned>(&self, query: &str) -> Result<Option<T>> {
        let path = self.entry_path(query);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&path).with_context(|| format!("Failed to read cache entry {}", path.display()))?;
        let value = serde_json::from_slice(&raw).with_context(|| format!("Corrupt cache entry {}", path.display()))?;
        Ok(Some(value))
    }

    pub fn put<T: Serialize>(&self, query: &str, value: &T) -> Result<()> {
        let path = self.entry_path(query);
        let raw = serde_json::to_vec_pretty(value)?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write cache entry {}", path.display()))?;
        tracing::debug!(path = %path.display(), "cached result");
        Ok(())
    }

    /// Remove every entry; returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        tracing::info!(removed, dir = %self.dir.display(), "cleared query cache");
        Ok(removed)
    }
}
