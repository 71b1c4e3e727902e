//! Visual classification of tree nodes.
//!
//! A total mapping from `NodeKind` to a `VisualClass`, tested in a fixed
//! priority order: conditionals and loops, then containers, then structural
//! items, then leaves.

use serde::Serialize;

use crate::domain::node::{Node, NodeKind};

/// Shading band for containers, from the number of direct children that
/// branch or loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn from_score(score: usize) -> Self {
        if score > 3 {
            Complexity::High
        } else if score > 1 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    pub fn score(node: &Node) -> usize {
        node.children
            .iter()
            .filter(|c| c.kind.is_conditional() || c.kind.is_loop())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VisualClass {
    Branch,
    Loop,
    Container(Complexity),
    Structure,
    Leaf,
}

/// Graphviz-compatible style attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStyle {
    pub shape: &'static str,
    pub fill: &'static str,
    pub font: &'static str,
    pub style: &'static str,
}

impl VisualClass {
    pub fn classify(node: &Node) -> Self {
        let kind = node.kind;
        if kind.is_conditional() {
            VisualClass::Branch
        } else if kind.is_loop() {
            VisualClass::Loop
        } else if kind.is_scope_opening() {
            VisualClass::Container(Complexity::from_score(Complexity::score(node)))
        } else if kind.is_structural() {
            VisualClass::Structure
        } else {
            VisualClass::Leaf
        }
    }

    pub fn style(&self, kind: NodeKind) -> NodeStyle {
        match self {
            VisualClass::Branch | VisualClass::Loop => NodeStyle {
                shape: "diamond",
                fill: "orange",
                font: "black",
                style: "filled",
            },
            VisualClass::Container(complexity) => NodeStyle {
                shape: "box",
                fill: match complexity {
                    Complexity::Low => "lightgreen",
                    Complexity::Medium => "orange",
                    Complexity::High => "red",
                },
                font: if kind == NodeKind::Block { "white" } else { "black" },
                style: "filled,rounded",
            },
            VisualClass::Structure => NodeStyle {
                shape: "box",
                fill: "lightblue",
                font: "black",
                style: "filled",
            },
            VisualClass::Leaf => NodeStyle {
                shape: "box",
                fill: if kind == NodeKind::Error { "red" } else { "lightgray" },
                font: "black",
                style: "filled",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_branches(kind: NodeKind, branches: usize) -> Node {
        let mut node = Node::new("{ ... }", "Block", kind);
        for _ in 0..branches {
            node.add_child(Node::new("if (a)", "ExprIf", NodeKind::IfStatement));
        }
        node.add_child(Node::new("x = 1", "Local", NodeKind::LocalDeclaration));
        node
    }

    #[test]
    fn test_complexity_bands() {
        assert_eq!(Complexity::from_score(0), Complexity::Low);
        assert_eq!(Complexity::from_score(1), Complexity::Low);
        assert_eq!(Complexity::from_score(2), Complexity::Medium);
        assert_eq!(Complexity::from_score(3), Complexity::Medium);
        assert_eq!(Complexity::from_score(4), Complexity::High);
    }

    #[test]
    fn test_container_shading_counts_direct_children_only() {
        let block = with_branches(NodeKind::Block, 4);
        assert_eq!(
            VisualClass::classify(&block),
            VisualClass::Container(Complexity::High)
        );

        let nested = Node::new("main()", "ItemFn", NodeKind::Method).with_child(block);
        assert_eq!(
            VisualClass::classify(&nested),
            VisualClass::Container(Complexity::Low)
        );
    }

    #[test]
    fn test_priority_order() {
        let branch = with_branches(NodeKind::IfStatement, 0);
        assert_eq!(VisualClass::classify(&branch), VisualClass::Branch);
        let looped = Node::new("loop", "ExprLoop", NodeKind::LoopStatement);
        assert_eq!(VisualClass::classify(&looped), VisualClass::Loop);
        let class = Node::new("struct A", "ItemStruct", NodeKind::Class);
        assert_eq!(VisualClass::classify(&class), VisualClass::Structure);
        let leaf = Node::new("x = 1", "Local", NodeKind::LocalDeclaration);
        assert_eq!(VisualClass::classify(&leaf), VisualClass::Leaf);
    }

    #[test]
    fn test_block_label_text_is_white() {
        let style = VisualClass::Container(Complexity::Low).style(NodeKind::Block);
        assert_eq!(style.font, "white");
        assert_eq!(style.fill, "lightgreen");
        assert_eq!(VisualClass::Branch.style(NodeKind::IfStatement).shape, "diamond");
    }
}
