use std::collections::VecDeque;
use std::path::Path;

use crate::config::ChunkingSettings;
use crate::types::DocumentChunk;

/// Separators tried in order; the empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 256, chunk_overlap: 30 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

/// Text of one extracted page. `page` is 1-based; `None` for sources
/// without page structure.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: Option<u32>,
    pub text: String,
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    pub fn chunking_config(&self) -> &ChunkingConfig {
        &self.chunking_config
    }

    /// Split every page and number the chunks across the whole document.
    pub fn process_pages(&self, source: &Path, pages: &[PageText]) -> Vec<DocumentChunk> {
        let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "document".to_string());
        let source_str = source.to_string_lossy().to_string();
        let mut chunks = Vec::new();
        for page in pages {
            for content in self.split_text(&page.text) {
                let chunk_index = chunks.len();
                chunks.push(DocumentChunk {
                    id: format!("{}:{}:{}", stem, page.page.unwrap_or(0), chunk_index),
                    source: source_str.clone(),
                    page: page.page,
                    chunk_index,
                    content,
                });
            }
        }
        tracing::debug!(pages = pages.len(), chunks = chunks.len(), "split document");
        chunks
    }

    /// Recursive character split: pieces are cut on the coarsest separator
    /// present, merged back up to `chunk_size` characters, and consecutive
    /// chunks share up to `chunk_overlap` characters of trailing pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = match separators.iter().position(|s| s.is_empty() || text.contains(*s)) {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };
        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            split_keeping_separator(text, separator)
        };

        let mut final_chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunking_config.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            if rest.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, rest));
            }
        }
        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }
        final_chunks
    }

    fn merge_splits(&self, pieces: &[String]) -> Vec<String> {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.chunking_config;
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current) {
                    docs.push(doc);
                }
                // drop leading pieces until only the overlap remains and the next piece fits
                while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                    match current.pop_front() {
                        Some(first) => total -= char_len(first),
                        None => break,
                    }
                }
            }
            current.push_back(piece.as_str());
            total += len;
        }
        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Coarse token estimate: three tokens per four words.
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * 0.75
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, attaching it to the start of the following piece so
/// merged chunks keep the original spacing.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut parts = text.split(separator);
    let mut pieces: Vec<String> = parts.next().map(String::from).into_iter().collect();
    pieces.extend(parts.map(|p| format!("{separator}{p}")));
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_trimmed(parts: &VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
