use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;

use pdfrag_core::config::GenerationSettings;
use pdfrag_core::traits::Generator;

const EOS_TOKENS: [&str; 3] = ["<|eot_id|>", "<|end_of_text|>", "</s>"];

/// Quantized Llama-family model loaded from a GGUF file.
pub struct LlamaGenerator {
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    settings: GenerationSettings,
    eos_tokens: Vec<u32>,
}

impl LlamaGenerator {
    pub fn new(model_path: &Path, tokenizer_path: &Path, settings: GenerationSettings, device: Device) -> Result<Self> {
        let start = Instant::now();
        tracing::info!(model = %model_path.display(), "loading generation model");
        let mut file = std::fs::File::open(model_path)
            .with_context(|| format!("Failed to open model file {}", model_path.display()))?;
        let content = gguf_file::Content::read(&mut file).map_err(|e| e.with_path(model_path))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let eos_tokens = eos_token_ids(&tokenizer);
        if eos_tokens.is_empty() {
            tracing::warn!("tokenizer has no known EOS token; generation stops at max_new_tokens");
        }
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "generation model loaded");
        Ok(Self { model: Mutex::new(model), tokenizer, device, settings, eos_tokens })
    }

    fn prompt_budget(&self) -> usize {
        self.settings.context_window.saturating_sub(self.settings.max_new_tokens).max(1)
    }
}

/// Ids of every end-of-sequence marker the tokenizer knows. Llama 3 has
/// both `<|eot_id|>` and `<|end_of_text|>`.
pub fn eos_token_ids(tokenizer: &Tokenizer) -> Vec<u32> {
    EOS_TOKENS.iter().filter_map(|t| tokenizer.token_to_id(t)).collect()
}

/// Keep the last `budget` tokens so the question at the end of the prompt survives.
pub fn truncate_left(tokens: &[u32], budget: usize) -> &[u32] {
    if tokens.len() > budget { &tokens[tokens.len() - budget..] } else { tokens }
}

impl Generator for LlamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let encoding = self.tokenizer.encode(prompt, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let budget = self.prompt_budget();
        if encoding.get_ids().len() > budget {
            tracing::debug!(tokens = encoding.get_ids().len(), budget, "truncating prompt from the left");
        }
        let mut tokens = truncate_left(encoding.get_ids(), budget).to_vec();
        let prompt_len = tokens.len();

        let mut model = self.model.lock().map_err(|_| anyhow!("generation model lock poisoned"))?;
        let mut logits_processor = LogitsProcessor::new(self.settings.seed, Some(self.settings.temperature), None);
        let mut generated: Vec<u32> = Vec::new();
        let mut index_pos = 0usize;

        for step in 0..self.settings.max_new_tokens {
            let context = if step == 0 { &tokens[..] } else { &tokens[tokens.len() - 1..] };
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, index_pos)?.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += context.len();

            let logits = if (self.settings.repetition_penalty - 1.0).abs() < f32::EPSILON {
                logits
            } else {
                let from = tokens.len().saturating_sub(self.settings.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(&logits, self.settings.repetition_penalty, &tokens[from..])?
            };

            let next = logits_processor.sample(&logits)?;
            if self.eos_tokens.contains(&next) {
                break;
            }
            tokens.push(next);
            generated.push(next);
        }
        drop(model);

        let answer = self.tokenizer.decode(&generated, true).map_err(|e| anyhow!("Detokenization failed: {}", e))?;
        tracing::debug!(
            prompt_tokens = prompt_len,
            new_tokens = generated.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated answer"
        );
        Ok(answer.trim().to_string())
    }
}
