use crate::domain::flowgraph::FlowGraph;
use crate::domain::node::Node;
use crate::error::GenerationError;

pub mod flowchart_exporter;

/// Source text in, annotated tree out. Never fails: parse errors become an
/// error tree.
pub trait TreeBuilder {
    fn build_tree(&self, source: &str) -> Node;
}

/// External text-generation collaborator. Calls block; callers keep them off
/// the session thread.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

pub trait GraphExporter {
    fn render(&self, graph: &FlowGraph) -> std::io::Result<String>;
}
