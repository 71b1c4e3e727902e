// Core model: annotated trees, scope tracking, flow graphs and mutation.

pub mod flowgraph;
pub mod label;
pub mod mutation;
pub mod node;
pub mod prompts;
pub mod scope;
pub mod style;
pub mod synthesizer;
