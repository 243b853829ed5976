//! Helpers shared by the `pdfrag` binaries.

use std::path::{Path, PathBuf};

use pdfrag_core::config::{Config, RagSettings};
use tracing_subscriber::EnvFilter;

pub const EXCERPT_CHARS: usize = 200;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn load_settings() -> anyhow::Result<RagSettings> {
    Config::load()?.settings()
}

/// A path given on the command line is taken as-is; the configured default
/// resolves against `paths.base_dir`.
pub fn document_path(arg: Option<PathBuf>, settings: &RagSettings) -> PathBuf {
    arg.unwrap_or_else(|| settings.path(&settings.demo.document_path))
}

/// First `EXCERPT_CHARS` characters, with `...` appended when cut.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() { format!("{head}...") } else { head }
}

pub fn check_document(path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(pdfrag_core::Error::NotFound(path.display().to_string()).into())
    }
}

/// One-line cause chain followed by the full debug report (causes and
/// backtrace when captured).
pub fn error_report(e: &anyhow::Error) -> String {
    format!("{e:#}\n{e:?}")
}
