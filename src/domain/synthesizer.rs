//! Tree Synthesizer
//!
//! Converts a `syn` syntax tree into the annotated `Node` model. Methods and
//! blocks open a fresh scope copy and thread it through their statements in
//! order, so later statements see earlier declarations. Branches receive the
//! scope as of entry to the branching node and never see each other's
//! declarations. Statement lists are chained with sequential sibling links.

use proc_macro2::Span;
use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    BinOp, Block, Expr, ExprForLoop, ExprIf, ExprMatch, ExprWhile, FnArg, ImplItem, Item, Local,
    Macro, Pat, Signature, Stmt, Token, TraitItem,
};
use tracing::{debug, warn};

use crate::domain::label::{collapse_whitespace, flatten, shorten, truncate, SHORT_LIMIT};
use crate::domain::node::{Node, NodeKind};
use crate::domain::scope::Scope;
use crate::error::SynthesisError;

/// Builds annotated trees from Rust source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Synthesizer
    }

    /// Synthesize a tree for a live editing pass. Parse failures never
    /// propagate; they become a single `Error` node.
    pub fn synthesize(&self, source: &str) -> Node {
        match self.try_synthesize(source) {
            Ok(root) => root,
            Err(err) => {
                warn!(error = %err, "parse failed, substituting error tree");
                error_tree(&err)
            }
        }
    }

    pub fn try_synthesize(&self, source: &str) -> Result<Node, SynthesisError> {
        if source.trim().is_empty() {
            return Ok(Node::new("Root", "File", NodeKind::CompilationUnit));
        }
        let file = syn::parse_file(source)?;
        let root = Self::file_node(&file);
        debug!(nodes = root.count(), "synthesized tree");
        Ok(root)
    }

    fn file_node(file: &syn::File) -> Node {
        let scope = Scope::new();
        let mut root =
            Node::new("Root", "File", NodeKind::CompilationUnit).with_scope(scope.snapshot());
        for item in &file.items {
            root.add_child(Self::item(item, &scope));
        }
        root
    }

    // ─────────────────────────────────────────────────────────────────────
    // Items (structural-only nodes pass the scope through unchanged)
    // ─────────────────────────────────────────────────────────────────────

    fn item(item: &Item, scope: &Scope) -> Node {
        match item {
            Item::Fn(func) => Self::method(&func.sig, &func.block, "ItemFn", scope),
            Item::Mod(module) => match &module.content {
                Some((_, items)) => {
                    let mut node =
                        Node::new(format!("mod {}", module.ident), "ItemMod", NodeKind::Namespace)
                            .with_scope(scope.snapshot());
                    for member in items {
                        node.add_child(Self::item(member, scope));
                    }
                    node
                }
                None => Self::fallback(item, "ItemMod", NodeKind::Item, scope),
            },
            Item::Struct(s) => Self::class(format!("struct {}", s.ident), "ItemStruct", scope),
            Item::Enum(e) => Self::class(format!("enum {}", e.ident), "ItemEnum", scope),
            Item::Union(u) => Self::class(format!("union {}", u.ident), "ItemUnion", scope),
            Item::Trait(t) => {
                let mut node = Self::class(format!("trait {}", t.ident), "ItemTrait", scope);
                for member in &t.items {
                    let child = match member {
                        TraitItem::Fn(f) => match &f.default {
                            Some(body) => Self::method(&f.sig, body, "TraitItemFn", scope),
                            // A required method has no body to drop into.
                            None => Node::new(
                                format!("{}()", f.sig.ident),
                                "TraitItemFn",
                                NodeKind::Item,
                            )
                            .with_scope(scope.snapshot()),
                        },
                        other => Self::fallback(other, "TraitItem", NodeKind::Item, scope),
                    };
                    node.add_child(child);
                }
                node
            }
            Item::Impl(imp) => {
                let self_ty = collapse_whitespace(&source_text(&*imp.self_ty));
                let label = match &imp.trait_ {
                    Some((_, path, _)) => format!(
                        "impl {} for {}",
                        collapse_whitespace(&source_text(path)),
                        self_ty
                    ),
                    None => format!("impl {}", self_ty),
                };
                let mut node = Self::class(label, "ItemImpl", scope);
                for member in &imp.items {
                    let child = match member {
                        ImplItem::Fn(f) => Self::method(&f.sig, &f.block, "ImplItemFn", scope),
                        other => Self::fallback(other, "ImplItem", NodeKind::Item, scope),
                    };
                    node.add_child(child);
                }
                node
            }
            other => Self::fallback(other, item_type_tag(other), NodeKind::Item, scope),
        }
    }

    fn class(label: String, type_tag: &str, scope: &Scope) -> Node {
        Node::new(label, type_tag, NodeKind::Class).with_scope(scope.snapshot())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope-opening nodes
    // ─────────────────────────────────────────────────────────────────────

    fn method(sig: &Signature, body: &Block, type_tag: &str, scope: &Scope) -> Node {
        let mut node = Node::new(format!("{}()", sig.ident), type_tag, NodeKind::Method);
        let mut local = scope.branch();

        for input in &sig.inputs {
            let names = match input {
                FnArg::Receiver(_) => vec!["self".to_string()],
                FnArg::Typed(typed) => pattern_bindings(&typed.pat),
            };
            for name in names {
                local.declare(name.clone());
                node.add_child(
                    Node::new(name, "FnArg", NodeKind::Parameter).with_scope(local.snapshot()),
                );
            }
        }

        Self::statements(&mut node, &body.stmts, &mut local);
        node.accessible_variables = local.snapshot();
        node
    }

    fn block(block: &Block, type_tag: &str, scope: &Scope) -> Node {
        let mut node = Node::new("{ ... }", type_tag, NodeKind::Block);
        let mut local = scope.branch();
        Self::statements(&mut node, &block.stmts, &mut local);
        node.accessible_variables = local.snapshot();
        node
    }

    /// Emit each statement in order, threading `scope`, and chain every
    /// statement to the one before it.
    fn statements(parent: &mut Node, stmts: &[Stmt], scope: &mut Scope) {
        let mut previous: Option<usize> = None;
        for stmt in stmts {
            let node = Self::statement(stmt, scope);
            let id = node.id;
            if let Some(prev) = previous {
                parent.children[prev].add_sequential_sibling(id);
            }
            parent.children.push(node);
            previous = Some(parent.children.len() - 1);
        }
    }

    fn statement(stmt: &Stmt, scope: &mut Scope) -> Node {
        match stmt {
            Stmt::Local(local) => Self::declaration(local, scope),
            Stmt::Item(item) => Self::item(item, scope),
            Stmt::Expr(expr, _) => Self::expression_statement(expr, scope),
            Stmt::Macro(stmt_macro) => Self::macro_call(&stmt_macro.mac, "StmtMacro", scope),
        }
    }

    fn declaration(local: &Local, scope: &mut Scope) -> Node {
        let names = pattern_bindings(&local.pat);
        // Declared before the node is emitted so it sees itself.
        scope.declare_all(names.iter().cloned());

        let declared = if names.is_empty() {
            collapse_whitespace(&source_text(&local.pat))
        } else {
            names.join(", ")
        };
        let label = match &local.init {
            Some(init) => format!(
                "{} = {}",
                declared,
                collapse_whitespace(&source_text(&*init.expr))
            ),
            None => format!("{} = <no init>", declared),
        };

        let snapshot = scope.snapshot();
        let mut node =
            Node::new(label, "Local", NodeKind::LocalDeclaration).with_scope(snapshot.clone());
        for name in names {
            node.add_child(
                Node::new(name, "PatIdent", NodeKind::Identifier).with_scope(snapshot.clone()),
            );
        }
        if let Some(init) = &local.init {
            node.add_child(Self::expression(&init.expr, scope));
        }
        node
    }

    // ─────────────────────────────────────────────────────────────────────
    // Branching and looping nodes
    // ─────────────────────────────────────────────────────────────────────

    fn expression_statement(expr: &Expr, scope: &Scope) -> Node {
        match expr {
            Expr::If(e) => Self::if_statement(e, scope),
            Expr::Match(m) => Self::match_statement(m, scope),
            Expr::ForLoop(f) => Self::for_statement(f, scope),
            Expr::While(w) => Self::while_statement(w, scope),
            Expr::Loop(l) => Node::new("loop", "ExprLoop", NodeKind::LoopStatement)
                .with_scope(scope.snapshot())
                .with_child(Self::block(&l.body, "Block", scope)),
            Expr::Block(b) => Self::block(&b.block, "ExprBlock", scope),
            Expr::Unsafe(u) => Self::block(&u.block, "ExprUnsafe", scope),
            other => Self::expression(other, scope),
        }
    }

    fn if_statement(e: &ExprIf, scope: &Scope) -> Node {
        let label = format!("if ({})", shorten(&source_text(&*e.cond), SHORT_LIMIT));
        let mut node = Node::new(label, "ExprIf", NodeKind::IfStatement).with_scope(scope.snapshot());

        let mut then_scope = scope.branch();
        if let Expr::Let(binding) = &*e.cond {
            then_scope.declare_all(pattern_bindings(&binding.pat));
        }
        node.add_child(Self::block(&e.then_branch, "Block", &then_scope));

        if let Some((_, else_branch)) = &e.else_branch {
            node.add_child(Self::expression_statement(else_branch, &scope.branch()));
        }
        node
    }

    fn match_statement(m: &ExprMatch, scope: &Scope) -> Node {
        let label = format!("match ({})", shorten(&source_text(&*m.expr), SHORT_LIMIT));
        let mut node =
            Node::new(label, "ExprMatch", NodeKind::MatchStatement).with_scope(scope.snapshot());
        for arm in &m.arms {
            let mut arm_scope = scope.branch();
            arm_scope.declare_all(pattern_bindings(&arm.pat));
            node.add_child(Self::expression_statement(&arm.body, &arm_scope));
        }
        node
    }

    fn for_statement(f: &ExprForLoop, scope: &Scope) -> Node {
        let label = format!(
            "for ({} in {})",
            collapse_whitespace(&source_text(&*f.pat)),
            shorten(&source_text(&*f.expr), SHORT_LIMIT)
        );
        let mut body_scope = scope.branch();
        body_scope.declare_all(pattern_bindings(&f.pat));
        Node::new(label, "ExprForLoop", NodeKind::ForStatement)
            .with_scope(scope.snapshot())
            .with_child(Self::block(&f.body, "Block", &body_scope))
    }

    fn while_statement(w: &ExprWhile, scope: &Scope) -> Node {
        let label = format!("while ({})", shorten(&source_text(&*w.cond), SHORT_LIMIT));
        let mut body_scope = scope.branch();
        if let Expr::Let(binding) = &*w.cond {
            body_scope.declare_all(pattern_bindings(&binding.pat));
        }
        Node::new(label, "ExprWhile", NodeKind::WhileStatement)
            .with_scope(scope.snapshot())
            .with_child(Self::block(&w.body, "Block", &body_scope))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression labeling
    // ─────────────────────────────────────────────────────────────────────

    fn expression(expr: &Expr, scope: &Scope) -> Node {
        let node = match expr {
            Expr::Binary(bin) => {
                let op = bin.op.to_token_stream().to_string();
                let kind = if is_compound_assign(&bin.op) {
                    NodeKind::AssignmentExpression
                } else {
                    NodeKind::BinaryExpression
                };
                Node::new(shorten(&op, SHORT_LIMIT), "ExprBinary", kind)
                    .with_child(Self::expression(&bin.left, scope))
                    .with_child(Self::expression(&bin.right, scope))
            }
            Expr::Assign(assign) => {
                Node::new("=", "ExprAssign", NodeKind::AssignmentExpression)
                    .with_child(Self::expression(&assign.left, scope))
                    .with_child(Self::expression(&assign.right, scope))
            }
            Expr::Call(call) => {
                let callee = flatten(&source_text(&*call.func));
                let mut node = Node::new(
                    format!("{}()", callee),
                    "ExprCall",
                    NodeKind::InvocationExpression,
                );
                for arg in &call.args {
                    node.add_child(Self::expression(arg, scope));
                }
                node
            }
            Expr::MethodCall(call) => {
                let receiver = flatten(&source_text(&*call.receiver));
                let mut node = Node::new(
                    format!("{}.{}()", receiver, call.method),
                    "ExprMethodCall",
                    NodeKind::InvocationExpression,
                );
                for arg in &call.args {
                    node.add_child(Self::expression(arg, scope));
                }
                node
            }
            Expr::Macro(m) => return Self::macro_call(&m.mac, "ExprMacro", scope),
            Expr::Path(p) => Node::new(
                collapse_whitespace(&source_text(p)),
                "ExprPath",
                NodeKind::Identifier,
            ),
            Expr::Lit(lit) => Node::new(
                lit.lit.to_token_stream().to_string(),
                "ExprLit",
                NodeKind::Literal,
            ),
            Expr::Return(ret) => {
                let mut node = Node::new(
                    flatten(&source_text(ret)),
                    "ExprReturn",
                    NodeKind::ReturnStatement,
                );
                if let Some(value) = &ret.expr {
                    node.add_child(Self::expression(value, scope));
                }
                node
            }
            other => return Self::fallback(other, expr_type_tag(other), NodeKind::Expression, scope),
        };
        node.with_scope(scope.snapshot())
    }

    fn macro_call(mac: &Macro, type_tag: &str, scope: &Scope) -> Node {
        let mut node = Node::new(
            format!("{}!()", path_text(&mac.path)),
            type_tag,
            NodeKind::InvocationExpression,
        )
        .with_scope(scope.snapshot());
        // Arguments are only labeled when the body reads as plain expressions.
        if let Ok(args) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                node.add_child(Self::expression(arg, scope));
            }
        }
        node
    }

    fn fallback<T: ToTokens>(syntax: &T, type_tag: &str, kind: NodeKind, scope: &Scope) -> Node {
        Node::new(flatten(&source_text(syntax)), type_tag, kind).with_scope(scope.snapshot())
    }
}

/// Degenerate single-node tree used when the parser rejects the source.
pub fn error_tree(err: &SynthesisError) -> Node {
    Node::new(
        format!("Parsing Error: {}...", truncate(&err.message, 50)),
        "Error",
        NodeKind::Error,
    )
}

/// Names bound by a pattern, in pattern order. Capitalized bare identifiers
/// are unit variants or constants and bind nothing.
pub fn pattern_bindings(pat: &Pat) -> Vec<String> {
    let mut names = Vec::new();
    collect_bindings(pat, &mut names);
    names
}

fn collect_bindings(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(p) => {
            let name = p.ident.to_string();
            let explicit = p.by_ref.is_some() || p.mutability.is_some() || p.subpat.is_some();
            if explicit || !name.starts_with(|c: char| c.is_uppercase()) {
                out.push(name);
            }
            if let Some((_, sub)) = &p.subpat {
                collect_bindings(sub, out);
            }
        }
        Pat::Tuple(t) => t.elems.iter().for_each(|e| collect_bindings(e, out)),
        Pat::TupleStruct(t) => t.elems.iter().for_each(|e| collect_bindings(e, out)),
        Pat::Struct(s) => s.fields.iter().for_each(|f| collect_bindings(&f.pat, out)),
        Pat::Slice(s) => s.elems.iter().for_each(|e| collect_bindings(e, out)),
        Pat::Reference(r) => collect_bindings(&r.pat, out),
        Pat::Type(t) => collect_bindings(&t.pat, out),
        Pat::Paren(p) => collect_bindings(&p.pat, out),
        // Every alternative binds the same names.
        Pat::Or(o) => {
            if let Some(first) = o.cases.first() {
                collect_bindings(first, out);
            }
        }
        _ => {}
    }
}

/// Original source text of a syntax node, or its token rendering when the
/// span carries no location.
fn source_text<T: ToTokens>(syntax: &T) -> String {
    let span: Span = syntax.span();
    span.source_text()
        .unwrap_or_else(|| syntax.to_token_stream().to_string())
}

fn path_text(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn is_compound_assign(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
            | BinOp::BitXorAssign(_)
            | BinOp::BitAndAssign(_)
            | BinOp::BitOrAssign(_)
            | BinOp::ShlAssign(_)
            | BinOp::ShrAssign(_)
    )
}

fn item_type_tag(item: &Item) -> &'static str {
    match item {
        Item::Const(_) => "ItemConst",
        Item::Static(_) => "ItemStatic",
        Item::Use(_) => "ItemUse",
        Item::Type(_) => "ItemType",
        Item::Macro(_) => "ItemMacro",
        Item::ExternCrate(_) => "ItemExternCrate",
        Item::ForeignMod(_) => "ItemForeignMod",
        Item::TraitAlias(_) => "ItemTraitAlias",
        _ => "Item",
    }
}

fn expr_type_tag(expr: &Expr) -> &'static str {
    match expr {
        Expr::Array(_) => "ExprArray",
        Expr::Async(_) => "ExprAsync",
        Expr::Await(_) => "ExprAwait",
        Expr::Break(_) => "ExprBreak",
        Expr::Cast(_) => "ExprCast",
        Expr::Closure(_) => "ExprClosure",
        Expr::Continue(_) => "ExprContinue",
        Expr::Field(_) => "ExprField",
        Expr::Index(_) => "ExprIndex",
        Expr::Paren(_) => "ExprParen",
        Expr::Range(_) => "ExprRange",
        Expr::Reference(_) => "ExprReference",
        Expr::Struct(_) => "ExprStruct",
        Expr::Try(_) => "ExprTry",
        Expr::Tuple(_) => "ExprTuple",
        Expr::Unary(_) => "ExprUnary",
        _ => "Expr",
    }
}
