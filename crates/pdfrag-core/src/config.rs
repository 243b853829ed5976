//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(RagSettings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding callers).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view over every section, validated.
    pub fn settings(&self) -> anyhow::Result<RagSettings> {
        let settings: RagSettings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub paths: PathSettings,
    pub device: DeviceSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub context: ContextSettings,
    pub chunking: ChunkingSettings,
    pub prompt: PromptSettings,
    pub demo: DemoSettings,
}

impl RagSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be at least 1".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into()));
        }
        if self.generation.max_new_tokens >= self.generation.context_window {
            return Err(Error::InvalidConfig(format!(
                "generation.max_new_tokens ({}) must be smaller than generation.context_window ({})",
                self.generation.max_new_tokens, self.generation.context_window
            )));
        }
        if self.context.max_tokens.is_nan() || self.context.max_tokens < 0.0 {
            return Err(Error::InvalidConfig("context.max_tokens must be non-negative".into()));
        }
        Ok(())
    }

    /// Resolve a configured path against `paths.base_dir`.
    pub fn path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&expand_path(&self.paths.base_dir), p)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path(&self.paths.cache_dir)
    }

    pub fn vector_db_dir(&self) -> PathBuf {
        self.path(&self.paths.vector_db_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub base_dir: String,
    pub cache_dir: String,
    pub vector_db_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self { base_dir: ".".to_string(), cache_dir: "cache".to_string(), vector_db_dir: "vector_db".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Metal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub batch_size: usize,
    pub normalize: bool,
    pub max_len: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_dir: "models/ko-sroberta-multitask".to_string(),
            batch_size: 8,
            normalize: true,
            max_len: 256,
            use_fake: false,
            fake_dim: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model_path: String,
    pub tokenizer_path: String,
    pub context_window: usize,
    pub temperature: f64,
    pub max_new_tokens: usize,
    pub repetition_penalty: f32,
    pub repeat_last_n: usize,
    pub seed: u64,
    pub use_fake: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model_path: "models/Llama-3.2-Korean-GGACHI-1B-Instruct-v1/model-q8_0.gguf".to_string(),
            tokenizer_path: "models/Llama-3.2-Korean-GGACHI-1B-Instruct-v1/tokenizer.json".to_string(),
            context_window: 1024,
            temperature: 0.1,
            max_new_tokens: 128,
            repetition_penalty: 1.1,
            repeat_last_n: 64,
            seed: 299_792_458,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_tokens: f64,
    pub label: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_tokens: 512.0, label: "Document".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 256, chunk_overlap: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub template: String,
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the question using only the documents below. \
If the documents do not contain the answer, say that you do not know.\n\n\
{context}\n\
Question: {query}\n\
Answer:";

impl Default for PromptSettings {
    fn default() -> Self {
        Self { template: DEFAULT_PROMPT_TEMPLATE.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub document_path: String,
    pub query: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            document_path: "PLAYGROUND_JUNGGU.pdf".to_string(),
            query: "명동에 처음 온 외국인 관광객이 가볼만한 장소를 알려줘?".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
