use anyhow::Result;

use pdfrag_core::config::ContextSettings;
use pdfrag_core::data_processor::estimate_tokens;
use pdfrag_core::PipelineState;

use crate::graph::{PipelineNode, PipelineStage};

/// Concatenates retrieved documents into a labelled context block, stopping
/// at the first document that would push the estimate past `max_tokens`.
pub struct ContextBuilder {
    max_tokens: f64,
    label: String,
}

impl ContextBuilder {
    pub fn new(max_tokens: f64, label: impl Into<String>) -> Self {
        Self { max_tokens, label: label.into() }
    }

    pub fn build(&self, state: PipelineState) -> PipelineState {
        let mut parts = Vec::new();
        let mut used = 0.0;
        for (i, doc) in state.documents().iter().enumerate() {
            let cost = estimate_tokens(&doc.content);
            if used + cost > self.max_tokens {
                tracing::debug!(included = i, budget = self.max_tokens, "context budget reached");
                break;
            }
            used += cost;
            parts.push(format!("{} {}:\n{}\n", self.label, i + 1, doc.content));
        }
        let context = parts.join("\n");
        tracing::debug!(blocks = parts.len(), estimated_tokens = used, "built context");
        state.with_context(context)
    }
}

impl From<&ContextSettings> for ContextBuilder {
    fn from(s: &ContextSettings) -> Self {
        Self::new(s.max_tokens, s.label.clone())
    }
}

impl PipelineNode for ContextBuilder {
    fn name(&self) -> &'static str { "context_builder" }
    fn stage(&self) -> PipelineStage { PipelineStage::ContextBuilt }
    fn run(&self, state: PipelineState) -> Result<PipelineState> { Ok(self.build(state)) }
}
