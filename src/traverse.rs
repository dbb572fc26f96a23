//! Depth-first traversal over a [`Tree`] with enter and exit callbacks.
//!
//! The parents chain handed to callbacks is ordered closest ancestor first.
//! Every step checks that the closest ancestor really holds the node, and a
//! node reached twice within one walk is an error: both indicate a pass left
//! the tree in an inconsistent state.

use rustc_hash::FxHashSet;

use crate::tree::{NodeId, Tree};
use crate::{ObfuscateError, Result};

/// What `enter` asks the walker to do next.
pub enum Enter<D> {
    Continue,
    /// Do not descend into this node.
    Skip,
    /// Abort the whole walk. No exit callbacks run.
    Exit,
    /// Descend, then hand the token back to `exit` once all children are done.
    Defer(D),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Completed,
    Exited,
}

pub trait Visitor {
    type Deferred;

    fn enter(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
    ) -> Result<Enter<Self::Deferred>>;

    fn exit(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _deferred: Self::Deferred,
    ) -> Result<()> {
        Ok(())
    }
}

struct Walker {
    seen: FxHashSet<NodeId>,
    chain: Vec<NodeId>,
}

impl Walker {
    fn visit<V: Visitor + ?Sized>(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        visitor: &mut V,
    ) -> Result<Walk> {
        if let Some(&parent) = self.chain.first() {
            if !tree.contains_child(parent, node) {
                return Err(ObfuscateError::BrokenChain {
                    node,
                    kind: tree.kind(node),
                    parent,
                    parent_kind: tree.kind(parent),
                });
            }
        }
        if !self.seen.insert(node) {
            return Err(ObfuscateError::VisitedTwice {
                node,
                kind: tree.kind(node),
            });
        }

        let deferred = match visitor.enter(tree, node, &self.chain)? {
            Enter::Continue => None,
            Enter::Skip => return Ok(Walk::Completed),
            Enter::Exit => return Ok(Walk::Exited),
            Enter::Defer(token) => Some(token),
        };

        let children = tree.children(node);
        self.chain.insert(0, node);
        let mut outcome = Ok(Walk::Completed);
        for child in children {
            // Detached by a mutation since the snapshot was taken.
            if !tree.contains_child(node, child) {
                continue;
            }
            match self.visit(tree, child, visitor) {
                Ok(Walk::Completed) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }
        self.chain.remove(0);

        if outcome? == Walk::Exited {
            return Ok(Walk::Exited);
        }
        if let Some(token) = deferred {
            visitor.exit(tree, node, &self.chain, token)?;
        }
        Ok(Walk::Completed)
    }
}

pub fn walk<V: Visitor + ?Sized>(
    tree: &mut Tree,
    node: NodeId,
    parents: &[NodeId],
    visitor: &mut V,
) -> Result<Walk> {
    let mut walker = Walker {
        seen: FxHashSet::default(),
        chain: parents.to_vec(),
    };
    walker.visit(tree, node, visitor)
}

struct FnVisitor<F>(F);

impl<F> Visitor for FnVisitor<F>
where
    F: FnMut(&mut Tree, NodeId, &[NodeId]) -> Result<Enter<()>>,
{
    type Deferred = ();

    fn enter(&mut self, tree: &mut Tree, node: NodeId, parents: &[NodeId]) -> Result<Enter<()>> {
        (self.0)(tree, node, parents)
    }
}

/// Walks with a plain enter closure.
pub fn walk_fn<F>(tree: &mut Tree, node: NodeId, parents: &[NodeId], enter: F) -> Result<Walk>
where
    F: FnMut(&mut Tree, NodeId, &[NodeId]) -> Result<Enter<()>>,
{
    walk(tree, node, parents, &mut FnVisitor(enter))
}

/// Read-only pre-order scan. The callback returns whether to descend.
pub fn scan<F>(tree: &Tree, node: NodeId, parents: &[NodeId], mut f: F)
where
    F: FnMut(NodeId, &[NodeId]) -> bool,
{
    fn go<F: FnMut(NodeId, &[NodeId]) -> bool>(
        tree: &Tree,
        node: NodeId,
        chain: &mut Vec<NodeId>,
        f: &mut F,
    ) {
        if !f(node, chain) {
            return;
        }
        chain.insert(0, node);
        for child in tree.children(node) {
            go(tree, child, chain, f);
        }
        chain.remove(0);
    }

    let mut chain = parents.to_vec();
    go(tree, node, &mut chain, &mut f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tree::Kind;

    struct Recorder {
        entered: Vec<NodeId>,
        exited: Vec<NodeId>,
    }

    impl Visitor for Recorder {
        type Deferred = ();

        fn enter(&mut self, _: &mut Tree, node: NodeId, _: &[NodeId]) -> Result<Enter<()>> {
            self.entered.push(node);
            Ok(Enter::Defer(()))
        }

        fn exit(&mut self, _: &mut Tree, node: NodeId, _: &[NodeId], (): ()) -> Result<()> {
            self.exited.push(node);
            Ok(())
        }
    }

    fn descendants(tree: &Tree, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        scan(tree, node, &[], |id, _| {
            if id != node {
                out.push(id);
            }
            true
        });
        out
    }

    #[test]
    fn test_visits_every_node_once_in_post_order() {
        let mut tree = parse(
            "function f(a, b) { if (a) { return b + 1; } return [a, , b]; } f(1, 2);",
            false,
        )
        .unwrap();
        let root = tree.root();
        let mut recorder = Recorder {
            entered: Vec::new(),
            exited: Vec::new(),
        };
        walk(&mut tree, root, &[], &mut recorder).unwrap();

        let mut all = descendants(&tree, root);
        all.push(root);
        assert_eq!(recorder.entered.len(), all.len());
        assert_eq!(recorder.exited.len(), all.len());

        let position = |id: NodeId| recorder.exited.iter().position(|x| *x == id).unwrap();
        for node in &all {
            for child in descendants(&tree, *node) {
                assert!(
                    position(child) < position(*node),
                    "{} exited before its descendant {}",
                    node,
                    child
                );
            }
        }
    }

    #[test]
    fn test_broken_chain_fails_before_enter() {
        let mut tree = parse("a; b;", false).unwrap();
        let root = tree.root();
        let first = tree.list(root, "body")[0];
        let stranger = tree.identifier("stranger");
        let mut entered = false;
        let err = walk_fn(&mut tree, stranger, &[first], |_, _, _| {
            entered = true;
            Ok(Enter::Continue)
        })
        .unwrap_err();
        assert!(!entered);
        assert!(matches!(err, ObfuscateError::BrokenChain { .. }), "{err}");
    }

    #[test]
    fn test_aliased_node_is_rejected() {
        let mut tree = parse("f(x);", false).unwrap();
        let root = tree.root();
        let stmt = tree.list(root, "body")[0];
        let call = tree.child(stmt, "expression").unwrap();
        let x = tree.list(call, "arguments")[0];
        tree.set(call, "arguments", vec![x, x]);
        let err = walk_fn(&mut tree, root, &[], |_, _, _| Ok(Enter::Continue)).unwrap_err();
        assert!(matches!(err, ObfuscateError::VisitedTwice { .. }), "{err}");
    }

    #[test]
    fn test_exit_stops_walk_without_exit_callbacks() {
        struct StopAtCall {
            exits: usize,
            entered: usize,
        }
        impl Visitor for StopAtCall {
            type Deferred = ();
            fn enter(&mut self, tree: &mut Tree, node: NodeId, _: &[NodeId]) -> Result<Enter<()>> {
                self.entered += 1;
                if tree.is(node, Kind::CallExpression) {
                    return Ok(Enter::Exit);
                }
                Ok(Enter::Defer(()))
            }
            fn exit(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], (): ()) -> Result<()> {
                self.exits += 1;
                Ok(())
            }
        }

        let mut tree = parse("a; f(); b; c;", false).unwrap();
        let root = tree.root();
        let mut visitor = StopAtCall {
            exits: 0,
            entered: 0,
        };
        let outcome = walk(&mut tree, root, &[], &mut visitor).unwrap();
        assert_eq!(outcome, Walk::Exited);
        // Program, `a;`, `a`, `f();`, `f()`
        assert_eq!(visitor.entered, 5);
        // only `a` and `a;` completed
        assert_eq!(visitor.exits, 2);
    }

    #[test]
    fn test_mutation_during_walk_keeps_siblings() {
        let mut tree = parse("a; b; c;", false).unwrap();
        let root = tree.root();
        let mut seen = Vec::new();
        walk_fn(&mut tree, root, &[], |tree, node, parents| {
            if let Some(name) = tree.name(node) {
                seen.push(name.to_string());
                if name == "a" {
                    // drop `c;` and add a new statement in front of everything
                    let body = tree.list(parents[1], "body").to_vec();
                    let extra = tree.identifier("extra");
                    let extra = tree.expression_statement(extra);
                    tree.set(parents[1], "body", vec![extra, body[0], body[1]]);
                }
            }
            Ok(Enter::Continue)
        })
        .unwrap();
        assert_eq!(seen, vec!["a", "b"]);
    }
}
