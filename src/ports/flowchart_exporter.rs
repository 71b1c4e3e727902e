//! Flowchart DOT Exporter
//!
//! Exports FlowGraph as Graphviz DOT. Structural edges are thin gray
//! arrows; flow edges are thick dim-gray arrows numbered in emission order.

use crate::domain::flowgraph::{EdgeKind, FlowEdge, FlowGraph, FlowNode};

pub struct FlowchartExporter;

impl FlowchartExporter {
    /// Convert FlowGraph to DOT string.
    pub fn to_dot(flow: &FlowGraph) -> String {
        let mut lines = Vec::new();

        lines.push("digraph FlowChart {".to_string());
        lines.push("    rankdir=TB;".to_string());
        lines.push("    nodesep=0.6;".to_string());
        lines.push("    ranksep=0.8;".to_string());
        lines.push("    node [fontname=\"Helvetica\", fontsize=12];".to_string());
        lines.push("    edge [fontname=\"Helvetica\", fontsize=10];".to_string());
        lines.push("".to_string());

        for node in &flow.nodes {
            lines.push(Self::node_line(node));
        }

        lines.push("".to_string());

        for edge in &flow.edges {
            lines.push(Self::edge_line(edge));
        }

        // Group nodes by depth for layered layout
        for layer in flow.nodes_by_depth() {
            if !layer.is_empty() {
                let ids: Vec<String> = layer.iter().map(|n| format!("\"{}\"", n.id)).collect();
                lines.push(format!("    {{ rank=same; {} }}", ids.join("; ")));
            }
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn node_line(node: &FlowNode) -> String {
        let style = &node.style;
        format!(
            "    \"{}\" [label=\"{}\", shape={}, style=\"{}\", fillcolor=\"{}\", fontcolor=\"{}\"];",
            node.id,
            Self::escape_label(&node.label),
            style.shape,
            style.style,
            style.fill,
            style.font
        )
    }

    fn edge_line(edge: &FlowEdge) -> String {
        match edge.kind {
            EdgeKind::Structural => format!(
                "    \"{}\" -> \"{}\" [color=\"gray\"];",
                edge.from, edge.to
            ),
            EdgeKind::Flow => format!(
                "    \"{}\" -> \"{}\" [color=\"dimgray\", penwidth=2, label=\"{}\"];",
                edge.from, edge.to, edge.sequence
            ),
        }
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}
