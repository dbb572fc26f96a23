//! Removes code that can never run.

use super::truthiness;
use crate::Result;
use crate::traverse::scan;
use crate::transform::{Context, Transform, Visit};
use crate::tree::{Kind, NodeId, Tree};

pub struct MinifyFlow;

impl MinifyFlow {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for MinifyFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Names bound by a declaration pattern.
pub fn binding_names(tree: &Tree, pattern: NodeId, out: &mut Vec<String>) {
    match tree.kind(pattern) {
        Kind::Identifier => {
            if let Some(name) = tree.name(pattern) {
                out.push(name.to_string());
            }
        }
        Kind::ObjectPattern => {
            for property in tree.list(pattern, "properties") {
                let target = if tree.is(*property, Kind::Property) {
                    tree.child(*property, "value")
                } else {
                    Some(*property)
                };
                if let Some(target) = target {
                    binding_names(tree, target, out);
                }
            }
        }
        Kind::ArrayPattern => {
            for element in tree.list(pattern, "elements") {
                binding_names(tree, *element, out);
            }
        }
        Kind::RestElement => {
            if let Some(argument) = tree.child(pattern, "argument") {
                binding_names(tree, argument, out);
            }
        }
        Kind::AssignmentPattern => {
            if let Some(left) = tree.child(pattern, "left") {
                binding_names(tree, left, out);
            }
        }
        _ => {}
    }
}

/// Statements that keep the bindings of dropped code alive: function
/// declarations at the top of `dropped` stay as they are when
/// `keep_functions` is set, every other `var` (and nested function) name is
/// declared without a value. Lexical declarations at the top of `dropped`
/// become an uninitialized `let`, so closures that reach them still hit the
/// temporal dead zone.
pub(super) fn remnants(tree: &mut Tree, dropped: &[NodeId], keep_functions: bool) -> Vec<NodeId> {
    let mut kept = Vec::new();
    let mut names = Vec::new();
    let mut lexical = Vec::new();
    for &statement in dropped {
        if keep_functions && tree.is(statement, Kind::FunctionDeclaration) {
            kept.push(statement);
            continue;
        }
        match tree.kind(statement) {
            Kind::VariableDeclaration if tree.str(statement, "kind") != Some("var") => {
                for declarator in tree.list(statement, "declarations") {
                    if let Some(id) = tree.child(*declarator, "id") {
                        binding_names(tree, id, &mut lexical);
                    }
                }
                continue;
            }
            Kind::ClassDeclaration => {
                if let Some(id) = tree.child(statement, "id").and_then(|id| tree.name(id)) {
                    lexical.push(id.to_string());
                }
                continue;
            }
            _ => {}
        }
        scan(tree, statement, &[], |node, _| match tree.kind(node) {
            Kind::VariableDeclaration => {
                if tree.str(node, "kind") == Some("var") {
                    for declarator in tree.list(node, "declarations") {
                        if let Some(id) = tree.child(*declarator, "id") {
                            binding_names(tree, id, &mut names);
                        }
                    }
                }
                true
            }
            Kind::FunctionDeclaration => {
                if let Some(id) = tree.child(node, "id").and_then(|id| tree.name(id)) {
                    names.push(id.to_string());
                }
                false
            }
            kind => !kind.is_function() && !kind.is_class(),
        });
    }
    for (kind, names) in [("var", names), ("let", lexical)] {
        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            continue;
        }
        let declarators = unique
            .iter()
            .map(|name| {
                let id = tree.identifier(name);
                tree.declarator(id, None)
            })
            .collect();
        kept.push(tree.declaration(kind, declarators));
    }
    kept
}

/// Keeps `statements` up to the first one that ends the flow, plus the
/// bindings of whatever follows it. `None` when nothing is unreachable.
pub(super) fn truncate(tree: &mut Tree, statements: &[NodeId]) -> Option<Vec<NodeId>> {
    let end = statements.iter().position(|s| ends_flow(tree.kind(*s)))?;
    if end + 1 == statements.len() {
        return None;
    }
    let mut kept = statements[..=end].to_vec();
    kept.extend(remnants(tree, &statements[end + 1..], true));
    Some(kept)
}

/// Whether a value picked out of a conditional would behave differently
/// once it replaces the conditional in this position: a member callee
/// would receive its object as `this`, and `delete`/`typeof` inspect
/// references rather than values.
fn needs_value_wrapper(tree: &Tree, chosen: NodeId, conditional: NodeId, parents: &[NodeId]) -> bool {
    let Some(&parent) = parents.first() else {
        return false;
    };
    let is_reference = matches!(tree.kind(chosen), Kind::MemberExpression | Kind::Identifier);
    match tree.kind(parent) {
        Kind::CallExpression => {
            tree.is(chosen, Kind::MemberExpression) && tree.field_of(parent, conditional) == Some("callee")
        }
        Kind::TaggedTemplateExpression => {
            tree.is(chosen, Kind::MemberExpression) && tree.field_of(parent, conditional) == Some("tag")
        }
        Kind::UnaryExpression => {
            is_reference && matches!(tree.str(parent, "operator"), Some("delete" | "typeof"))
        }
        _ => false,
    }
}

/// Replaces `node` with `statements`, wrapping several in a block and none
/// in an empty statement.
fn replace_with_statements(tree: &mut Tree, node: NodeId, statements: Vec<NodeId>) {
    let replacement = match statements.as_slice() {
        [] => tree.empty_statement(),
        [only] => *only,
        _ => tree.block(statements),
    };
    tree.replace(node, replacement, "MinifyFlow");
}

pub(super) fn ends_flow(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::ReturnStatement | Kind::ThrowStatement | Kind::BreakStatement | Kind::ContinueStatement
    )
}

fn statement_key(kind: Kind) -> Option<&'static str> {
    match kind {
        Kind::Program | Kind::BlockStatement | Kind::StaticBlock => Some("body"),
        Kind::SwitchCase => Some("consequent"),
        _ => None,
    }
}

impl Transform for MinifyFlow {
    fn name(&self) -> &'static str {
        "MinifyFlow"
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        match tree.kind(node) {
            Kind::IfStatement | Kind::ConditionalExpression => tree
                .child(node, "test")
                .is_some_and(|test| truthiness(tree, test).is_some()),
            Kind::WhileStatement => tree
                .child(node, "test")
                .is_some_and(|test| truthiness(tree, test) == Some(false)),
            kind => statement_key(kind).is_some(),
        }
    }

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<Visit> {
        let kind = tree.kind(node);
        let test = tree.child(node, "test").and_then(|t| truthiness(tree, t));
        match (kind, test) {
            (Kind::ConditionalExpression, Some(taken)) => {
                let branch = if taken { "consequent" } else { "alternate" };
                if let Some(chosen) = tree.child(node, branch) {
                    let replacement = if needs_value_wrapper(tree, chosen, node, parents) {
                        let zero = tree.number(0.0);
                        tree.sequence(vec![zero, chosen])
                    } else {
                        chosen
                    };
                    tree.replace(node, replacement, "MinifyFlow");
                }
            }
            (Kind::IfStatement, Some(taken)) => {
                let (keep, drop) = if taken {
                    ("consequent", "alternate")
                } else {
                    ("alternate", "consequent")
                };
                let dropped: Vec<NodeId> = tree.child(node, drop).into_iter().collect();
                let mut statements: Vec<NodeId> = tree.child(node, keep).into_iter().collect();
                statements.extend(remnants(tree, &dropped, false));
                replace_with_statements(tree, node, statements);
            }
            (Kind::WhileStatement, Some(false)) => {
                let dropped: Vec<NodeId> = tree.child(node, "body").into_iter().collect();
                let statements = remnants(tree, &dropped, false);
                replace_with_statements(tree, node, statements);
            }
            _ => {
                let Some(key) = statement_key(kind) else {
                    return Ok(Visit::Continue);
                };
                let list = tree.list(node, key).to_vec();
                if let Some(kept) = truncate(tree, &list) {
                    tree.set(node, key, kept);
                }
            }
        }
        Ok(Visit::Continue)
    }
}
