//! Mutation Engine
//!
//! Splices a freshly built construct into the current tree according to the
//! drop target and the relation the user picked. The engine only appends;
//! scope snapshots downstream of the insertion are stale until the next
//! synthesis pass.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::node::{Node, NodeId, NodeKind};
use crate::error::MutationError;

/// Kind of construct carried by a drop payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    If,
    For,
    While,
    Loop,
    Function,
    Class,
    Assign,
    Print,
    Return,
    Custom,
}

impl ConstructKind {
    /// Accepts payloads such as `type:If` or `console.write`; anything
    /// unrecognized is `Custom`.
    pub fn from_payload(payload: &str) -> Self {
        let trimmed = payload.trim();
        let name = trimmed
            .strip_prefix("type:")
            .unwrap_or(trimmed)
            .trim()
            .to_lowercase();
        match name.as_str() {
            "if" => ConstructKind::If,
            "for" => ConstructKind::For,
            "while" => ConstructKind::While,
            "loop" | "do/while" | "do-while" => ConstructKind::Loop,
            "function" | "fn" => ConstructKind::Function,
            "class" | "struct" => ConstructKind::Class,
            "assign" => ConstructKind::Assign,
            "print" | "console.write" => ConstructKind::Print,
            "return" => ConstructKind::Return,
            _ => ConstructKind::Custom,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConstructKind::If => "if",
            ConstructKind::For => "for",
            ConstructKind::While => "while",
            ConstructKind::Loop => "loop",
            ConstructKind::Function => "function",
            ConstructKind::Class => "class",
            ConstructKind::Assign => "assign",
            ConstructKind::Print => "print",
            ConstructKind::Return => "return",
            ConstructKind::Custom => "custom",
        }
    }
}

/// What to insert: a construct kind plus the user's text for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNodeDescriptor {
    pub kind: ConstructKind,
    /// Payload name, kept for custom constructs
    pub name: String,
    pub text: String,
}

impl NewNodeDescriptor {
    pub fn new(kind: ConstructKind, text: impl Into<String>) -> Self {
        NewNodeDescriptor {
            kind,
            name: kind.name().to_string(),
            text: text.into(),
        }
    }

    pub fn from_payload(payload: &str, text: impl Into<String>) -> Self {
        let trimmed = payload.trim();
        let name = trimmed.strip_prefix("type:").unwrap_or(trimmed).trim();
        NewNodeDescriptor {
            kind: ConstructKind::from_payload(payload),
            name: name.to_string(),
            text: text.into(),
        }
    }

    /// Build the fixed node shape for this construct. Independent of any tree.
    pub fn build(&self) -> Node {
        let text = self.text.trim();
        let or = |default: &str| {
            if text.is_empty() {
                default.to_string()
            } else {
                text.to_string()
            }
        };
        let tag = self.kind.name();

        match self.kind {
            ConstructKind::If => Node::new(format!("if ({})", or("a > 10")), tag, NodeKind::IfStatement)
                .with_child(placeholder_block("// TODO: If body")),
            ConstructKind::For => {
                Node::new(format!("for ({})", or("i in 0..10")), tag, NodeKind::ForStatement)
                    .with_child(placeholder_block("// TODO: Loop body"))
            }
            ConstructKind::While => {
                Node::new(format!("while ({})", or("true")), tag, NodeKind::WhileStatement)
                    .with_child(placeholder_block("// TODO: Loop body"))
            }
            ConstructKind::Loop => Node::new("loop", tag, NodeKind::LoopStatement)
                .with_child(placeholder_block("// TODO: Loop body")),
            ConstructKind::Function => {
                Node::new(format!("{}()", or("new_function")), tag, NodeKind::Method)
                    .with_child(Node::new("{ ... }", "Block", NodeKind::Block))
            }
            ConstructKind::Class => {
                Node::new(format!("struct {}", or("NewStruct")), tag, NodeKind::Class)
            }
            ConstructKind::Assign => Node::new(or("let x = 0;"), tag, NodeKind::LocalDeclaration),
            ConstructKind::Print => Node::new(
                format!("println!({});", or("\"Hello World\"")),
                tag,
                NodeKind::InvocationExpression,
            ),
            ConstructKind::Return => {
                let label = if text.is_empty() {
                    "return;".to_string()
                } else {
                    format!("return {};", text)
                };
                Node::new(label, tag, NodeKind::ReturnStatement)
            }
            ConstructKind::Custom => Node::new(or(self.name.as_str()), self.name.as_str(), NodeKind::Custom),
        }
    }
}

fn placeholder_block(todo: &str) -> Node {
    Node::new("{ ... }", "Block", NodeKind::Block)
        .with_child(Node::new(todo, "Placeholder", NodeKind::Placeholder))
}

/// Where the user dropped the construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Canvas,
    Node(NodeId),
}

/// How a construct dropped on a non-container node relates to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    SequentialAfter,
    StructuralChild,
    Free,
}

impl Relation {
    /// Parse a user's relation choice. Numeric choices follow the prompt
    /// order: 1 sequential, 2 child, 3 free.
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim().to_lowercase().as_str() {
            "1" | "sequential" | "sequential-after" | "after" => Some(Relation::SequentialAfter),
            "2" | "child" | "structural-child" | "inside" => Some(Relation::StructuralChild),
            "3" | "free" => Some(Relation::Free),
            _ => None,
        }
    }
}

/// The placement rule that was actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    /// No target: deepest container in the tree
    DeepestContainer,
    /// Target was itself a container
    EnteredContainer,
    SequentialAfter,
    StructuralChild,
    Free,
}

#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub descriptor: NewNodeDescriptor,
    pub target: DropTarget,
    /// Ignored unless the target is a non-container node. `None` there
    /// means free placement.
    pub relation: Option<Relation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// The new node; focus of the next graph rebuild
    pub inserted: NodeId,
    /// Structural parent it was appended to
    pub parent: NodeId,
    pub placement: Placement,
    /// A default container had to be created first
    pub synthesized_container: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MutationEngine;

impl MutationEngine {
    pub fn new() -> Self {
        MutationEngine
    }

    pub fn apply(
        &self,
        root: &mut Node,
        request: &MutationRequest,
    ) -> Result<MutationOutcome, MutationError> {
        let node = request.descriptor.build();

        let outcome = match request.target {
            DropTarget::Canvas => Self::attach_to_deepest(root, node, Placement::DeepestContainer)?,
            DropTarget::Node(target) => {
                let target_kind = root
                    .find(target)
                    .map(|n| n.kind)
                    .ok_or(MutationError::UnknownTarget(target))?;

                if target_kind.is_scope_opening() {
                    Self::attach(root, target, node, Placement::EnteredContainer)?
                } else {
                    match request.relation.unwrap_or(Relation::Free) {
                        Relation::SequentialAfter => {
                            Self::attach_after(root, target, node)?
                        }
                        Relation::StructuralChild => {
                            Self::attach(root, target, node, Placement::StructuralChild)?
                        }
                        Relation::Free => Self::attach_to_deepest(root, node, Placement::Free)?,
                    }
                }
            }
        };

        debug!(
            inserted = %outcome.inserted,
            parent = %outcome.parent,
            placement = ?outcome.placement,
            "applied mutation"
        );
        Ok(outcome)
    }

    fn attach_after(
        root: &mut Node,
        target: NodeId,
        node: Node,
    ) -> Result<MutationOutcome, MutationError> {
        let Some(container) = root.enclosing_container(target) else {
            warn!(%target, "no enclosing container, falling back to free placement");
            return Self::attach_to_deepest(root, node, Placement::Free);
        };
        let outcome = Self::attach(root, container, node, Placement::SequentialAfter)?;
        root.find_mut(target)
            .ok_or(MutationError::UnknownTarget(target))?
            .add_sequential_sibling(outcome.inserted);
        Ok(outcome)
    }

    /// Rule 1 and 3c. Creates a default block on the root when the tree has
    /// no container at all.
    fn attach_to_deepest(
        root: &mut Node,
        node: Node,
        placement: Placement,
    ) -> Result<MutationOutcome, MutationError> {
        match root.deepest_container() {
            Some(container) => Self::attach(root, container, node, placement),
            None => {
                let block = Node::new("{ ... }", "Block", NodeKind::Block);
                let container = block.id;
                root.add_child(block);
                let mut outcome = Self::attach(root, container, node, placement)?;
                outcome.synthesized_container = true;
                Ok(outcome)
            }
        }
    }

    fn attach(
        root: &mut Node,
        parent: NodeId,
        node: Node,
        placement: Placement,
    ) -> Result<MutationOutcome, MutationError> {
        let inserted = node.id;
        root.find_mut(parent)
            .ok_or(MutationError::UnknownTarget(parent))?
            .add_child(node);
        Ok(MutationOutcome {
            inserted,
            parent,
            placement,
            synthesized_container: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_root() -> Node {
        Node::new("Root", "File", NodeKind::CompilationUnit)
    }

    fn request(kind: ConstructKind, target: DropTarget, relation: Option<Relation>) -> MutationRequest {
        MutationRequest {
            descriptor: NewNodeDescriptor::new(kind, ""),
            target,
            relation,
        }
    }

    #[test]
    fn test_payload_parsing() {
        assert_eq!(ConstructKind::from_payload("type:If"), ConstructKind::If);
        assert_eq!(ConstructKind::from_payload("Do/While"), ConstructKind::Loop);
        assert_eq!(ConstructKind::from_payload("Console.Write"), ConstructKind::Print);
        assert_eq!(ConstructKind::from_payload("type:Try/Catch"), ConstructKind::Custom);

        let custom = NewNodeDescriptor::from_payload("type:Try/Catch", "");
        assert_eq!(custom.build().label, "Try/Catch");
        assert_eq!(custom.build().kind, NodeKind::Custom);
    }

    #[test]
    fn test_construct_shapes() {
        let iff = NewNodeDescriptor::new(ConstructKind::If, "").build();
        assert_eq!(iff.label, "if (a > 10)");
        assert_eq!(iff.children.len(), 1);
        assert_eq!(iff.children[0].kind, NodeKind::Block);
        assert_eq!(iff.children[0].children[0].kind, NodeKind::Placeholder);

        let func = NewNodeDescriptor::new(ConstructKind::Function, "helper").build();
        assert_eq!(func.label, "helper()");
        assert_eq!(func.children.len(), 1);
        assert!(func.children[0].children.is_empty());

        let class = NewNodeDescriptor::new(ConstructKind::Class, "").build();
        assert_eq!(class.label, "struct NewStruct");
        assert!(class.children.is_empty());

        assert_eq!(NewNodeDescriptor::new(ConstructKind::Return, "").build().label, "return;");
        assert_eq!(NewNodeDescriptor::new(ConstructKind::Return, "x").build().label, "return x;");
        assert_eq!(
            NewNodeDescriptor::new(ConstructKind::Print, "").build().label,
            "println!(\"Hello World\");"
        );
    }

    #[test]
    fn test_empty_program_gets_one_synthesized_container() {
        let mut root = empty_root();
        let outcome = MutationEngine::new()
            .apply(&mut root, &request(ConstructKind::Assign, DropTarget::Canvas, None))
            .unwrap();

        assert!(outcome.synthesized_container);
        assert_eq!(root.children.len(), 1);
        let container = &root.children[0];
        assert_eq!(container.kind, NodeKind::Block);
        assert_eq!(container.children.len(), 1);
        assert_eq!(container.children[0].id, outcome.inserted);
    }

    #[test]
    fn test_if_then_return_sequential_after_placeholder() {
        let engine = MutationEngine::new();
        let mut root = empty_root();
        let first = engine
            .apply(&mut root, &request(ConstructKind::If, DropTarget::Canvas, None))
            .unwrap();
        let iff = root.find(first.inserted).unwrap();
        assert_eq!(iff.kind, NodeKind::IfStatement);
        let inner_block = iff.children[0].id;
        let placeholder = iff.children[0].children[0].id;

        let second = engine
            .apply(
                &mut root,
                &request(
                    ConstructKind::Return,
                    DropTarget::Node(placeholder),
                    Some(Relation::SequentialAfter),
                ),
            )
            .unwrap();

        assert_eq!(second.placement, Placement::SequentialAfter);
        assert_eq!(second.parent, inner_block);
        let placeholder_node = root.find(placeholder).unwrap();
        assert_eq!(placeholder_node.sequential_siblings, vec![second.inserted]);
        let block = root.find(inner_block).unwrap();
        assert_eq!(block.children.len(), 2);
    }

    #[test]
    fn test_container_target_is_entered() {
        let engine = MutationEngine::new();
        let mut root = empty_root();
        let func = engine
            .apply(&mut root, &request(ConstructKind::Function, DropTarget::Canvas, None))
            .unwrap();
        let outcome = engine
            .apply(
                &mut root,
                &request(
                    ConstructKind::Print,
                    DropTarget::Node(func.inserted),
                    Some(Relation::SequentialAfter),
                ),
            )
            .unwrap();
        assert_eq!(outcome.placement, Placement::EnteredContainer);
        assert_eq!(outcome.parent, func.inserted);
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let mut root = empty_root();
        let missing = NodeId::new();
        let result = MutationEngine::new().apply(
            &mut root,
            &request(ConstructKind::If, DropTarget::Node(missing), None),
        );
        assert!(matches!(result, Err(MutationError::UnknownTarget(id)) if id == missing));
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_relation_choices() {
        assert_eq!(Relation::from_choice("1"), Some(Relation::SequentialAfter));
        assert_eq!(Relation::from_choice(" Child "), Some(Relation::StructuralChild));
        assert_eq!(Relation::from_choice("3"), Some(Relation::Free));
        assert_eq!(Relation::from_choice("maybe"), None);
    }
}
