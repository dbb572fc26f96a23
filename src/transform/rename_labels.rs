use super::label::jump_target;
use super::{Context, NameGenerator, Transform, Visit};
use crate::Result;
use crate::traverse::scan;
use crate::tree::{Kind, NodeId, Tree, Value};

/// Renames labels to short generated names, drops labels from jumps that
/// would reach the same statement without one, and removes labels nobody
/// uses any more.
pub struct RenameLabels {
    names: NameGenerator,
}

impl RenameLabels {
    pub fn new() -> Self {
        Self {
            names: NameGenerator::new(),
        }
    }
}

impl Default for RenameLabels {
    fn default() -> Self {
        Self::new()
    }
}

fn label_name(tree: &Tree, labeled: NodeId) -> Option<&str> {
    tree.child(labeled, "label").and_then(|l| tree.name(l))
}

/// Jumps inside `labeled` that refer to `label`, with their parents chains
/// relative to the labeled statement. Nested statements binding the same
/// label own their jumps.
fn label_users(tree: &Tree, labeled: NodeId, label: &str) -> Vec<(NodeId, Vec<NodeId>)> {
    let mut users = Vec::new();
    scan(tree, labeled, &[], |node, parents| {
        let kind = tree.kind(node);
        if kind.is_function() || kind.is_class() {
            return false;
        }
        if kind == Kind::LabeledStatement && node != labeled && label_name(tree, node) == Some(label) {
            return false;
        }
        if matches!(kind, Kind::BreakStatement | Kind::ContinueStatement) {
            let target = tree.child(node, "label").and_then(|l| tree.name(l));
            if target == Some(label) {
                users.push((node, parents.to_vec()));
            }
        }
        true
    });
    users
}

impl Transform for RenameLabels {
    fn name(&self) -> &'static str {
        "RenameLabels"
    }

    fn priority(&self) -> u32 {
        28
    }

    /// Labels already in the program are never handed out, so a renamed
    /// label cannot capture jumps meant for an enclosing one.
    fn prepare(&mut self, tree: &mut Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> Result<()> {
        let names = &mut self.names;
        scan(tree, node, &[], |id, _| {
            if tree.is(id, Kind::LabeledStatement) {
                if let Some(name) = label_name(tree, id) {
                    names.avoid(name);
                }
            }
            true
        });
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        tree.is(node, Kind::LabeledStatement)
    }

    fn transform(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> Result<Visit> {
        Ok(Visit::OnExit)
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        let Some(label) = tree.child(node, "label") else {
            return Ok(());
        };
        let Some(body) = tree.child(node, "body") else {
            return Ok(());
        };
        let Some(name) = tree.name(label).map(str::to_string) else {
            return Ok(());
        };

        let mut needed = Vec::new();
        for (jump, parents) in label_users(tree, node, &name) {
            // an unlabeled jump here would land on the labeled statement itself
            if jump_target(tree, jump, &parents) == Some(body) {
                tree.set(jump, "label", Value::Null);
            } else {
                needed.push(jump);
            }
        }

        if needed.is_empty() {
            tree.replace(node, body, "RenameLabels");
            return Ok(());
        }

        let fresh = self.names.generate();
        tree.set(label, "name", fresh.as_str());
        for jump in needed {
            if let Some(target) = tree.child(jump, "label") {
                tree.set(target, "name", fresh.as_str());
            }
        }
        Ok(())
    }
}
