use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use pdfrag_core::traits::Generator;
use pdfrag_core::PipelineState;

use crate::prompt::PromptTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Retrieved,
    ContextBuilt,
    Answered,
    Done,
}

/// One step of the graph. Takes the state and returns it with its own field set.
pub trait PipelineNode: Send + Sync {
    fn name(&self) -> &'static str;
    /// Stage the state is in once this node has run.
    fn stage(&self) -> PipelineStage;
    fn run(&self, state: PipelineState) -> Result<PipelineState>;
}

pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    prompt: PromptTemplate,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>, prompt: PromptTemplate) -> Self {
        Self { generator, prompt }
    }
}

impl PipelineNode for AnswerGenerator {
    fn name(&self) -> &'static str { "answer_generator" }
    fn stage(&self) -> PipelineStage { PipelineStage::Answered }

    fn run(&self, state: PipelineState) -> Result<PipelineState> {
        let prompt = self.prompt.render(state.context.as_deref().unwrap_or(""), &state.query);
        let answer = self.generator.generate(&prompt)?;
        Ok(state.with_answer(answer))
    }
}

/// Linear graph: nodes run once each, in insertion order.
pub struct RagGraph {
    nodes: Vec<Box<dyn PipelineNode>>,
}

impl RagGraph {
    pub fn new(nodes: Vec<Box<dyn PipelineNode>>) -> Self {
        Self { nodes }
    }

    pub fn node_names(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    pub fn invoke(&self, state: PipelineState) -> Result<PipelineState> {
        let mut stage = PipelineStage::Start;
        let mut state = state;
        for node in &self.nodes {
            let start = Instant::now();
            state = node.run(state)?;
            tracing::info!(node = node.name(), from = ?stage, to = ?node.stage(), elapsed_ms = start.elapsed().as_millis() as u64, "node finished");
            stage = node.stage();
        }
        tracing::debug!(from = ?stage, to = ?PipelineStage::Done, "graph finished");
        Ok(state)
    }

    /// Graphviz rendering of the node chain between start and end markers.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph rag {\n    rankdir=TB;\n    __start__ [shape=ellipse];\n");
        for name in self.node_names() {
            let _ = writeln!(dot, "    {name} [shape=box];");
        }
        dot.push_str("    __end__ [shape=ellipse];\n");
        let mut prev = "__start__";
        for name in self.node_names().into_iter().chain(std::iter::once("__end__")) {
            let _ = writeln!(dot, "    {prev} -> {name};");
            prev = name;
        }
        dot.push_str("}\n");
        dot
    }
}
