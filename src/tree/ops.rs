use super::{Kind, Node, NodeId, Tree, Value};
use crate::{ObfuscateError, Result};

impl Tree {
    /// Overwrites `node` with the kind and fields of `replacement`, keeping
    /// `node`'s handle. `replacement` is left detached and must not be
    /// traversed again.
    pub fn replace(&mut self, node: NodeId, replacement: NodeId, origin: &str) {
        if node == replacement {
            return;
        }
        let incoming = std::mem::replace(self.node_mut(replacement), Node::new(Kind::Detached));
        let target = self.node_mut(node);
        let mut comments = incoming.comments;
        comments.append(&mut target.comments);
        target.kind = incoming.kind;
        target.fields = incoming.fields;
        target.comments = comments;
        self.set(node, "$origin", origin);
    }

    /// Moves the contents of `node` to a fresh handle and leaves `node`
    /// detached, so a wrapper can later be written into `node` in place.
    pub fn relocate(&mut self, node: NodeId) -> NodeId {
        let moved = std::mem::replace(self.node_mut(node), Node::new(Kind::Detached));
        self.add(moved)
    }

    /// Deep copy of the sub-tree rooted at `node` with fresh handles.
    pub fn clone_node(&mut self, node: NodeId) -> NodeId {
        let source = self.node(node).clone();
        let mut fields = Vec::with_capacity(source.fields.len());
        for (key, value) in source.fields {
            let value = match value {
                Value::Node(child) => Value::Node(self.clone_node(child)),
                Value::List(items) => {
                    Value::List(items.into_iter().map(|c| self.clone_node(c)).collect())
                }
                other => other,
            };
            fields.push((key, value));
        }
        self.add(Node {
            kind: source.kind,
            fields,
            comments: source.comments,
        })
    }

    /// Removes `node` from `parent`: spliced out of a list, or a single-node
    /// field is nulled.
    pub fn delete_direct(&mut self, node: NodeId, parent: NodeId) -> Result<()> {
        let mut removed = false;
        for (_, value) in &mut self.node_mut(parent).fields {
            let hit = match value {
                Value::Node(id) => *id == node,
                Value::List(items) => {
                    if let Some(pos) = items.iter().position(|c| *c == node) {
                        items.remove(pos);
                        removed = true;
                        break;
                    }
                    false
                }
                _ => false,
            };
            if hit {
                *value = Value::Null;
                removed = true;
                break;
            }
        }
        if removed {
            Ok(())
        } else {
            Err(ObfuscateError::NotInParent {
                node,
                kind: self.kind(node),
                parent,
                parent_kind: self.kind(parent),
            })
        }
    }
}

fn statement_list_key(kind: Kind) -> Option<&'static str> {
    match kind {
        Kind::Program | Kind::BlockStatement | Kind::StaticBlock => Some("body"),
        Kind::SwitchCase => Some("consequent"),
        _ => None,
    }
}

fn nearest_block(tree: &Tree, node: NodeId, parents: &[NodeId]) -> Result<NodeId> {
    std::iter::once(node)
        .chain(parents.iter().copied())
        .find(|id| tree.kind(*id).is_block())
        .ok_or_else(|| ObfuscateError::NoEnclosingBlock {
            node,
            kind: tree.kind(node),
        })
}

/// Number of leading statements a prepend must stay behind: the directive
/// prologue, plus import declarations at the top of a program.
fn prologue_len(tree: &Tree, block: NodeId) -> usize {
    let program = tree.is(block, Kind::Program);
    tree.list(block, "body")
        .iter()
        .take_while(|s| {
            tree.get(**s, "directive").is_some()
                || (program && tree.is(**s, Kind::ImportDeclaration))
        })
        .count()
}

/// Inserts `statements` at the front of the nearest block enclosing `node`
/// (or `node` itself when it is a block).
pub fn prepend(
    tree: &mut Tree,
    node: NodeId,
    parents: &[NodeId],
    statements: Vec<NodeId>,
) -> Result<()> {
    let block = nearest_block(tree, node, parents)?;
    let at = prologue_len(tree, block);
    if let Some(body) = tree.list_mut(block, "body") {
        body.splice(at..at, statements);
    }
    Ok(())
}

/// Inserts `statements` at the end of the nearest enclosing block.
pub fn append(
    tree: &mut Tree,
    node: NodeId,
    parents: &[NodeId],
    statements: Vec<NodeId>,
) -> Result<()> {
    let block = nearest_block(tree, node, parents)?;
    if let Some(body) = tree.list_mut(block, "body") {
        body.extend(statements);
    }
    Ok(())
}

/// Finds the statement list holding `target` (or its closest ancestor that
/// sits in one) and the index of that statement.
fn statement_slot(
    tree: &Tree,
    target: NodeId,
    parents: &[NodeId],
) -> Result<(NodeId, &'static str, usize)> {
    let mut child = target;
    for &parent in parents {
        if let Some(key) = statement_list_key(tree.kind(parent)) {
            if let Some(index) = tree.list(parent, key).iter().position(|s| *s == child) {
                return Ok((parent, key, index));
            }
        }
        child = parent;
    }
    Err(ObfuscateError::NoEnclosingBlock {
        node: target,
        kind: tree.kind(target),
    })
}

pub fn insert_before(
    tree: &mut Tree,
    target: NodeId,
    parents: &[NodeId],
    statements: Vec<NodeId>,
) -> Result<()> {
    let (block, key, index) = statement_slot(tree, target, parents)?;
    if let Some(list) = tree.list_mut(block, key) {
        list.splice(index..index, statements);
    }
    Ok(())
}

pub fn insert_after(
    tree: &mut Tree,
    target: NodeId,
    parents: &[NodeId],
    statements: Vec<NodeId>,
) -> Result<()> {
    let (block, key, index) = statement_slot(tree, target, parents)?;
    if let Some(list) = tree.list_mut(block, key) {
        list.splice(index + 1..index + 1, statements);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(tree: &mut Tree, name: &str) -> NodeId {
        let id = tree.identifier(name);
        tree.expression_statement(id)
    }

    fn names(tree: &Tree, block: NodeId) -> Vec<String> {
        tree.list(block, "body")
            .iter()
            .map(|s| {
                let expr = tree.child(*s, "expression").unwrap();
                tree.name(expr)
                    .map(str::to_string)
                    .or_else(|| tree.string_value(expr).map(str::to_string))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_replace_keeps_identity() {
        let mut tree = Tree::new(false);
        let a = tree.identifier("a");
        let b = tree.string("b");
        tree.node_mut(b).comments.push("note".to_string());
        tree.replace(a, b, "Test");
        assert_eq!(tree.kind(a), Kind::Literal);
        assert_eq!(tree.string_value(a), Some("b"));
        assert_eq!(tree.str(a, "$origin"), Some("Test"));
        assert_eq!(tree.node(a).comments, vec!["note".to_string()]);
        assert_eq!(tree.kind(b), Kind::Detached);
    }

    #[test]
    fn test_clone_breaks_identity() {
        let mut tree = Tree::new(false);
        let a = tree.identifier("a");
        let b = tree.identifier("b");
        let call = tree.call(a, vec![b]);
        let copy = tree.clone_node(call);
        assert_ne!(copy, call);
        assert!(tree.structurally_equal(copy, call));
        let copied_callee = tree.child(copy, "callee").unwrap();
        assert_ne!(copied_callee, a);
        tree.set(copied_callee, "name", "z");
        assert_eq!(tree.name(a), Some("a"));
    }

    #[test]
    fn test_delete_direct() {
        let mut tree = Tree::new(false);
        let a = tree.identifier("a");
        let b = tree.identifier("b");
        let call = tree.call(a, vec![b]);
        tree.delete_direct(b, call).unwrap();
        assert!(tree.list(call, "arguments").is_empty());
        tree.delete_direct(a, call).unwrap();
        assert_eq!(tree.child(call, "callee"), None);
        let err = tree.delete_direct(a, call).unwrap_err();
        assert!(matches!(err, ObfuscateError::NotInParent { .. }), "{err}");
    }

    #[test]
    fn test_prepend_after_imports_and_directives() {
        let mut tree = Tree::new(true);
        let root = tree.root();
        let directive = tree.string("use strict");
        let directive = tree.expression_statement(directive);
        tree.set(directive, "directive", "use strict");
        let import = tree.add(
            Node::new(Kind::ImportDeclaration)
                .with("specifiers", Vec::new())
                .with("source", Value::Null),
        );
        let existing = statement(&mut tree, "existing");
        tree.set(root, "body", vec![directive, import, existing]);

        let added = statement(&mut tree, "added");
        prepend(&mut tree, root, &[], vec![added]).unwrap();
        assert_eq!(
            tree.list(root, "body"),
            &[directive, import, added, existing]
        );
    }

    #[test]
    fn test_insert_relative_to_nested_statement() {
        let mut tree = Tree::new(false);
        let root = tree.root();
        let first = statement(&mut tree, "first");
        let second = statement(&mut tree, "second");
        tree.set(root, "body", vec![first, second]);

        let inner = tree.child(second, "expression").unwrap();
        let before = statement(&mut tree, "before");
        insert_before(&mut tree, inner, &[second, root], vec![before]).unwrap();
        let after = statement(&mut tree, "after");
        insert_after(&mut tree, first, &[root], vec![after]).unwrap();
        let last = statement(&mut tree, "last");
        append(&mut tree, inner, &[second, root], vec![last]).unwrap();

        assert_eq!(
            names(&tree, root),
            vec!["first", "after", "before", "second", "last"]
        );
    }

    #[test]
    fn test_insert_without_block_fails() {
        let mut tree = Tree::new(false);
        let lonely = tree.identifier("x");
        let stmt = statement(&mut tree, "y");
        let err = insert_before(&mut tree, lonely, &[], vec![stmt]).unwrap_err();
        assert!(matches!(err, ObfuscateError::NoEnclosingBlock { .. }));
    }
}
