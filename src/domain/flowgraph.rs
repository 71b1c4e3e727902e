//! FlowGraph Data Structure
//!
//! Renderable graph derived from an annotated tree: one visual node per tree
//! node, structural edges for ownership and flow edges for the sequential
//! chains inside method bodies and blocks.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::node::{Node, NodeId, NodeKind};
use crate::domain::style::{NodeStyle, VisualClass};

/// A renderable graph built from one tree in one pass.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    /// All nodes in pre-order
    pub nodes: Vec<FlowNode>,
    /// Structural edges first, then flow edges
    pub edges: Vec<FlowEdge>,
    /// Graph id <-> node identity, valid for this build only
    pub index: GraphIndex,
}

/// A node in the flow graph
#[derive(Debug, Clone, Serialize)]
pub struct FlowNode {
    /// Graph identifier, fresh on every build
    pub id: String,
    /// Identity of the tree node this was built from
    pub node_id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    /// Classification for visual styling
    pub class: VisualClass,
    pub style: NodeStyle,
    /// Structural depth from the root
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Parent owns child
    Structural,
    /// Execution order between statements of one block
    Flow,
}

/// An edge in the flow graph
#[derive(Debug, Clone, Serialize)]
pub struct FlowEdge {
    /// Source node ID
    pub from: String,
    /// Target node ID
    pub to: String,
    pub kind: EdgeKind,
    /// Emission order within this build
    pub sequence: usize,
}

/// Bidirectional map between graph identifiers and node identities,
/// maintained while the graph is built.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    by_graph_id: HashMap<String, NodeId>,
    by_node_id: HashMap<NodeId, String>,
}

impl GraphIndex {
    fn insert(&mut self, graph_id: String, node_id: NodeId) {
        self.by_node_id.insert(node_id, graph_id.clone());
        self.by_graph_id.insert(graph_id, node_id);
    }

    pub fn node_for(&self, graph_id: &str) -> Option<NodeId> {
        self.by_graph_id.get(graph_id).copied()
    }

    pub fn graph_id_of(&self, node_id: NodeId) -> Option<&str> {
        self.by_node_id.get(&node_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_graph_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_graph_id.is_empty()
    }
}

impl FlowGraph {
    /// Build a graph from `root`. Every call assigns entirely new graph ids.
    pub fn build(root: &Node) -> Self {
        let mut graph = FlowGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            index: GraphIndex::default(),
        };
        let mut sequence = 0;

        Self::place_node(root, None, 0, &mut graph, &mut sequence);

        // Second pass: flow links, resolved through the index.
        let mut links = Vec::new();
        root.walk(&mut |node| {
            for next in &node.sequential_siblings {
                links.push((node.id, *next));
            }
        });
        for (from, to) in links {
            let resolved = (graph.index.graph_id_of(from), graph.index.graph_id_of(to));
            match resolved {
                (Some(from_gid), Some(to_gid)) => {
                    sequence += 1;
                    let edge = FlowEdge {
                        from: from_gid.to_string(),
                        to: to_gid.to_string(),
                        kind: EdgeKind::Flow,
                        sequence,
                    };
                    graph.edges.push(edge);
                }
                _ => debug!(%from, %to, "skipping flow link to a node outside the tree"),
            }
        }

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built flow graph"
        );
        graph
    }

    fn place_node(
        node: &Node,
        parent: Option<(&str, NodeKind)>,
        depth: usize,
        graph: &mut FlowGraph,
        sequence: &mut usize,
    ) {
        let graph_id = Uuid::new_v4().to_string();
        graph.index.insert(graph_id.clone(), node.id);

        let class = VisualClass::classify(node);
        graph.nodes.push(FlowNode {
            id: graph_id.clone(),
            node_id: node.id,
            label: node.label.clone(),
            kind: node.kind,
            class,
            style: class.style(node.kind),
            depth,
        });

        // Methods and blocks are implicit containers: no fan-out edges.
        if let Some((parent_id, parent_kind)) = parent {
            if !parent_kind.is_scope_opening() {
                *sequence += 1;
                graph.edges.push(FlowEdge {
                    from: parent_id.to_string(),
                    to: graph_id.clone(),
                    kind: EdgeKind::Structural,
                    sequence: *sequence,
                });
            }
        }

        for child in &node.children {
            Self::place_node(child, Some((graph_id.as_str(), node.kind)), depth + 1, graph, sequence);
        }
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Get nodes grouped by depth for layered rendering
    pub fn nodes_by_depth(&self) -> Vec<Vec<&FlowNode>> {
        let max_depth = self.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        let mut layers = vec![Vec::new(); max_depth + 1];
        for node in &self.nodes {
            layers[node.depth].push(node);
        }
        layers
    }
}
