//! Makes every `break` and `continue` name its target explicitly.
//!
//! Control-flow rewrites that introduce synthetic loops would otherwise
//! capture unlabeled jumps. Targets without a label get a generated one; the
//! wrapping happens on exit so the walk inside the target stays intact.

use rustc_hash::FxHashMap;

use super::{Context, Transform, Visit};
use crate::Result;
use crate::tree::{Kind, NodeId, Tree};

/// The statement an unlabeled jump at the end of `parents` transfers control
/// to, or `None` when there is none inside the current function.
pub fn jump_target(tree: &Tree, jump: NodeId, parents: &[NodeId]) -> Option<NodeId> {
    let is_break = tree.is(jump, Kind::BreakStatement);
    for &parent in parents {
        let kind = tree.kind(parent);
        if kind.is_function() || kind == Kind::Program {
            return None;
        }
        if kind.is_loop() || (is_break && kind == Kind::SwitchStatement) {
            return Some(parent);
        }
    }
    None
}

pub struct Label {
    /// Labels handed out to targets that have none yet.
    pending: FxHashMap<NodeId, String>,
}

impl Label {
    pub fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
        }
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Label {
    fn name(&self) -> &'static str {
        "Label"
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        match tree.kind(node) {
            Kind::BreakStatement | Kind::ContinueStatement => tree.child(node, "label").is_none(),
            kind => kind.is_loop() || kind == Kind::SwitchStatement,
        }
    }

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<Visit> {
        if !matches!(
            tree.kind(node),
            Kind::BreakStatement | Kind::ContinueStatement
        ) {
            return Ok(Visit::OnExit);
        }
        let Some(target) = jump_target(tree, node, parents) else {
            return Ok(Visit::Continue);
        };

        let index = parents.iter().position(|p| *p == target).unwrap_or_default();
        let existing = parents
            .get(index + 1)
            .filter(|p| tree.is(**p, Kind::LabeledStatement))
            .and_then(|p| tree.child(*p, "label"))
            .and_then(|l| tree.name(l))
            .map(str::to_string);
        let name = match existing {
            Some(name) => name,
            None => self
                .pending
                .entry(target)
                .or_insert_with(|| cx.placeholder())
                .clone(),
        };
        let label = tree.identifier(&name);
        tree.set(node, "label", label);
        Ok(Visit::Continue)
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        if let Some(name) = self.pending.remove(&node) {
            let moved = tree.relocate(node);
            let labeled = tree.labeled(&name, moved);
            tree.replace(node, labeled, "Label");
        }
        Ok(())
    }
}
