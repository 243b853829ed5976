use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;

use pdfrag_core::data_processor::PageText;

/// Turns a source file into page texts.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>>;
}

pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| anyhow!("PDF extraction failed for {}: {}", path.display(), e))?;
        tracing::debug!(pages = pages.len(), path = %path.display(), "extracted pdf text");
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText { page: Some(i as u32 + 1), text })
            .collect())
    }
}

/// UTF-8 text files; the whole file is one page.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<PageText>> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(vec![PageText { page: None, text }])
    }
}

/// Pick an extractor by file extension. Anything that is not `.txt` or
/// `.md` is treated as PDF.
pub fn extractor_for(path: &Path) -> Arc<dyn TextExtractor> {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => Arc::new(PlainTextExtractor),
        _ => Arc::new(PdfTextExtractor),
    }
}
