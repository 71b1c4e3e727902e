// Infrastructure implementations for Scopeflow.

use crate::api::dto::GraphDto;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::node::Node;
use crate::domain::synthesizer::Synthesizer;
use crate::ports::flowchart_exporter::FlowchartExporter;
use crate::ports::{GraphExporter, TreeBuilder};

pub mod debounce;
pub mod interchange;
pub mod text_generator;

impl TreeBuilder for Synthesizer {
    fn build_tree(&self, source: &str) -> Node {
        self.synthesize(source)
    }
}

pub struct DotExporter;
impl GraphExporter for DotExporter {
    fn render(&self, graph: &FlowGraph) -> std::io::Result<String> {
        Ok(FlowchartExporter::to_dot(graph))
    }
}

/// Graph as the JSON document handed to external render surfaces.
pub struct JsonGraphExporter;
impl GraphExporter for JsonGraphExporter {
    fn render(&self, graph: &FlowGraph) -> std::io::Result<String> {
        let dto = GraphDto::from(graph);
        Ok(serde_json::to_string_pretty(&dto)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporters_through_the_port() {
        let root = Synthesizer::new().build_tree("fn main() { let a = 1; }");
        let graph = FlowGraph::build(&root);

        let exporters: Vec<Box<dyn GraphExporter>> =
            vec![Box::new(DotExporter), Box::new(JsonGraphExporter)];
        let rendered: Vec<String> = exporters
            .iter()
            .map(|e| e.render(&graph).unwrap())
            .collect();

        assert!(rendered[0].contains("digraph"));
        let json: serde_json::Value = serde_json::from_str(&rendered[1]).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), root.count());
    }
}
