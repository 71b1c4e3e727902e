//! Annotated AST node model.
//!
//! A `Node` combines structural AST shape, a sequential flow link to the
//! statement that follows it, and a snapshot of the variables in scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value identity of a node. Stable for the lifetime of the node value,
/// unlike graph identifiers which are reassigned on every graph build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of syntactic categories, decided once at synthesis time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    CompilationUnit,
    Namespace,
    Class,
    Method,
    Parameter,
    Block,
    IfStatement,
    MatchStatement,
    ForStatement,
    WhileStatement,
    LoopStatement,
    LocalDeclaration,
    Identifier,
    Literal,
    BinaryExpression,
    AssignmentExpression,
    InvocationExpression,
    ReturnStatement,
    Placeholder,
    Custom,
    Item,
    Expression,
    Error,
}

impl NodeKind {
    /// Methods and blocks open a new lexical scope and anchor a flow chain.
    pub fn is_scope_opening(&self) -> bool {
        matches!(self, NodeKind::Method | NodeKind::Block)
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, NodeKind::IfStatement | NodeKind::MatchStatement)
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            NodeKind::ForStatement | NodeKind::WhileStatement | NodeKind::LoopStatement
        )
    }

    /// Containers that only group members and never open a scope.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NodeKind::CompilationUnit | NodeKind::Namespace | NodeKind::Class
        )
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::LocalDeclaration | NodeKind::AssignmentExpression
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::CompilationUnit => "CompilationUnit",
            NodeKind::Namespace => "Namespace",
            NodeKind::Class => "Class",
            NodeKind::Method => "Method",
            NodeKind::Parameter => "Parameter",
            NodeKind::Block => "Block",
            NodeKind::IfStatement => "IfStatement",
            NodeKind::MatchStatement => "MatchStatement",
            NodeKind::ForStatement => "ForStatement",
            NodeKind::WhileStatement => "WhileStatement",
            NodeKind::LoopStatement => "LoopStatement",
            NodeKind::LocalDeclaration => "LocalDeclaration",
            NodeKind::Identifier => "Identifier",
            NodeKind::Literal => "Literal",
            NodeKind::BinaryExpression => "BinaryExpression",
            NodeKind::AssignmentExpression => "AssignmentExpression",
            NodeKind::InvocationExpression => "InvocationExpression",
            NodeKind::ReturnStatement => "ReturnStatement",
            NodeKind::Placeholder => "Placeholder",
            NodeKind::Custom => "Custom",
            NodeKind::Item => "Item",
            NodeKind::Expression => "Expression",
            NodeKind::Error => "Error",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A node in the annotated syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Human-readable summary of the construct
    #[serde(default)]
    pub label: String,
    /// Concrete syntax category reported by the parser (e.g. `ExprIf`)
    pub type_tag: String,
    #[serde(rename = "kindTag")]
    pub kind: NodeKind,
    /// Structurally owned children, in source order
    #[serde(default)]
    pub children: Vec<Node>,
    /// Nodes that follow this one in control-flow order (references by id)
    #[serde(default)]
    pub sequential_siblings: Vec<NodeId>,
    /// Scope snapshot: variable names visible at this point
    #[serde(default)]
    pub accessible_variables: Vec<String>,
}

/// Label/kind projection of a tree, ignoring identities and scope data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeShape {
    pub label: String,
    pub kind: NodeKind,
    pub children: Vec<NodeShape>,
}

impl Node {
    pub fn new(label: impl Into<String>, type_tag: impl Into<String>, kind: NodeKind) -> Self {
        Node {
            id: NodeId::new(),
            label: label.into(),
            type_tag: type_tag.into(),
            kind,
            children: Vec::new(),
            sequential_siblings: Vec::new(),
            accessible_variables: Vec::new(),
        }
    }

    pub fn with_scope(mut self, variables: Vec<String>) -> Self {
        self.accessible_variables = variables;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn add_sequential_sibling(&mut self, sibling: NodeId) {
        self.sequential_siblings.push(sibling);
    }

    pub fn shape(&self) -> NodeShape {
        NodeShape {
            label: self.label.clone(),
            kind: self.kind,
            children: self.children.iter().map(Node::shape).collect(),
        }
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Nearest scope-opening ancestor of `target` (never `target` itself).
    pub fn enclosing_container(&self, target: NodeId) -> Option<NodeId> {
        fn search(node: &Node, target: NodeId, nearest: Option<NodeId>) -> Option<Option<NodeId>> {
            if node.id == target {
                return Some(nearest);
            }
            let nearest = if node.kind.is_scope_opening() {
                Some(node.id)
            } else {
                nearest
            };
            node.children
                .iter()
                .find_map(|child| search(child, target, nearest))
        }
        search(self, target, None).flatten()
    }

    /// The most deeply nested scope-opening node, last one wins in
    /// pre-order. With several sibling methods this is the last body seen.
    pub fn deepest_container(&self) -> Option<NodeId> {
        let mut best = None;
        self.walk(&mut |node| {
            if node.kind.is_scope_opening() {
                best = Some(node.id);
            }
        });
        best
    }
}
