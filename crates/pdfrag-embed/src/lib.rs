use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use pdfrag_core::config::{EmbeddingSettings, RagSettings};
use pdfrag_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use pool::{l2_normalize, masked_mean, masked_mean_l2};
pub use tokenize::tokenize_batch;

/// RoBERTa-family sentence encoder (e.g. ko-sroberta-multitask) running on candle.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    pad_id: u32,
    max_len: usize,
    batch_size: usize,
    normalize: bool,
}

impl EmbeddingModel {
    pub fn new(model_dir: &Path, settings: &EmbeddingSettings, device: Device) -> Result<Self> {
        tracing::info!(model_dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let meta: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = meta["hidden_size"].as_u64().ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let pad_id = meta["pad_token_id"].as_u64().unwrap_or(1) as u32;

        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dim, "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
            pad_id,
            max_len: settings.max_len,
            batch_size: settings.batch_size.max(1),
            normalize: settings.normalize,
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = if self.normalize { masked_mean_l2(&hidden, &attention_mask)? } else { masked_mean(&hidden, &attention_mask)? };
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while mapped
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path)
        .with_context(|| format!("Failed to read weights from {}", weights_path.display()))?;
    let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

/// Deterministic bag-of-hashed-tokens embedder. Texts sharing tokens end up
/// close in cosine space, which is enough for tests and offline development.
pub struct HashEmbedder { dim: usize, max_len: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), max_len: 512 } }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        Ok(texts.iter().map(|text| {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() {
                let mut hasher = XxHash64::with_seed(0);
                token.hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h as usize) % self.dim;
                let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                v[idx] += val + (i as f32 % 3.0) * 0.01;
            }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
            for x in &mut v { *x /= norm; }
            v
        }).collect())
    }
}

/// Build the embedder selected by configuration.
pub fn get_embedder(settings: &RagSettings) -> Result<Box<dyn Embedder>> {
    let embedding = &settings.embedding;
    if embedding.use_fake {
        tracing::info!(dim = embedding.fake_dim, "using HashEmbedder");
        return Ok(Box::new(HashEmbedder::new(embedding.fake_dim)));
    }
    let model_dir = resolve_model_dir(settings)?;
    let device = select_device(settings.device.kind);
    Ok(Box::new(EmbeddingModel::new(&model_dir, embedding, device)?))
}

fn resolve_model_dir(settings: &RagSettings) -> Result<PathBuf> {
    let dir = settings.path(&settings.embedding.model_dir);
    if dir.join("tokenizer.json").exists() { return Ok(dir); }
    Err(anyhow!("Could not locate embedding model directory (no tokenizer.json under {})", dir.display()))
}
