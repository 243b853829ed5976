//! Answer generation: a GGUF Llama model behind the `Generator` trait, a
//! lazily loading wrapper and a deterministic stand-in.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use pdfrag_core::config::RagSettings;
use pdfrag_core::traits::Generator;
use pdfrag_embed::select_device;

pub mod llama;

pub use llama::{eos_token_ids, truncate_left, LlamaGenerator};

/// Defers loading the model until the first `generate` call.
pub struct LazyGenerator {
    settings: RagSettings,
    inner: Mutex<Option<LlamaGenerator>>,
}

impl LazyGenerator {
    pub fn new(settings: RagSettings) -> Self {
        Self { settings, inner: Mutex::new(None) }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    fn load(&self) -> Result<LlamaGenerator> {
        let generation = &self.settings.generation;
        let model_path = self.settings.path(&generation.model_path);
        let tokenizer_path = self.settings.path(&generation.tokenizer_path);
        ensure_exists(&model_path, "generation model")?;
        ensure_exists(&tokenizer_path, "generation tokenizer")?;
        let device = select_device(self.settings.device.kind);
        LlamaGenerator::new(&model_path, &tokenizer_path, generation.clone(), device)
    }
}

impl Generator for LazyGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("generator lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        match guard.as_ref() {
            Some(generator) => generator.generate(prompt),
            None => Err(anyhow!("generator failed to initialise")),
        }
    }
}

fn ensure_exists(path: &Path, what: &str) -> Result<()> {
    if path.exists() { Ok(()) } else { Err(anyhow!("{} not found at {}", what, path.display())) }
}

/// Answers with the last non-empty line of the prompt (normally the
/// question) and the prompt size. Deterministic, no model needed.
#[derive(Debug, Default, Clone)]
pub struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let last = prompt.lines().rev().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        Ok(format!("[echo:{}] {}", prompt.chars().count(), last))
    }
}

/// Build the generator selected by configuration. The real model is wrapped
/// in a `LazyGenerator` so construction is cheap.
pub fn get_generator(settings: &RagSettings) -> Box<dyn Generator> {
    if settings.generation.use_fake {
        tracing::info!("using EchoGenerator");
        return Box::new(EchoGenerator);
    }
    Box::new(LazyGenerator::new(settings.clone()))
}
