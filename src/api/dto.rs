use serde::{Deserialize, Serialize};

use crate::domain::flowgraph::{EdgeKind, FlowGraph};
use crate::domain::mutation::MutationOutcome;

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDto {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    /// Graph id; only valid until the next rebuild
    pub id: String,
    /// Stable node identity
    pub node_id: String,
    pub label: String,
    pub kind: String,
    pub shape: String,
    pub fill: String,
    pub font: String,
    pub depth: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub sequence: usize,
}

impl From<&FlowGraph> for GraphDto {
    fn from(graph: &FlowGraph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| NodeDto {
                id: n.id.clone(),
                node_id: n.node_id.to_string(),
                label: n.label.clone(),
                kind: n.kind.name().to_string(),
                shape: n.style.shape.to_string(),
                fill: n.style.fill.to_string(),
                font: n.style.font.to_string(),
                depth: n.depth,
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|e| EdgeDto {
                from: e.from.clone(),
                to: e.to.clone(),
                type_: match e.kind {
                    EdgeKind::Structural => "structural".to_string(),
                    EdgeKind::Flow => "flow".to_string(),
                },
                sequence: e.sequence,
            })
            .collect();

        GraphDto { nodes, edges }
    }
}

/// Reply to a drop: where the node went, plus the rebuilt graph.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropDto {
    pub outcome: MutationOutcome,
    /// Graph id of the inserted node in `graph`
    pub focus: Option<String>,
    pub graph: GraphDto,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesizer::Synthesizer;

    #[test]
    fn test_edge_kinds_are_tagged() {
        let root = Synthesizer::new().synthesize("fn main() { let a = 1; let b = 2; }");
        let dto = GraphDto::from(&FlowGraph::build(&root));
        assert!(dto.edges.iter().any(|e| e.type_ == "flow"));
        assert!(dto.edges.iter().any(|e| e.type_ == "structural"));

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json["edges"][0].get("type").is_some());
        assert!(json["nodes"][0].get("nodeId").is_some());
    }
}
