//! Hides functions inside `eval` strings.
//!
//! A selected function is first sent through the passes that have not run
//! yet, then printed and replaced with a direct `eval` of its source. Direct
//! `eval` runs in the caller's scope, so closures keep working. Declarations
//! are moved to the front of their body to keep them hoisted.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{Context, Transform, Visit};
use crate::Result;
use crate::analysis::classify;
use crate::codegen::Codegen;
use crate::traverse::scan;
use crate::tree::{Kind, NodeId, Tree, insert_after, prepend};

pub struct Eval {
    /// Set when the program declares its own `eval`.
    shadowed: bool,
    /// Last hoisted statement per block, so hoisted functions keep their order.
    hoisted: FxHashMap<NodeId, NodeId>,
}

impl Eval {
    pub fn new() -> Self {
        Self {
            shadowed: false,
            hoisted: FxHashMap::default(),
        }
    }
}

impl Default for Eval {
    fn default() -> Self {
        Self::new()
    }
}

fn declares_eval(tree: &Tree) -> bool {
    let mut found = false;
    scan(tree, tree.root(), &[], |node, parents| {
        if !found && tree.is_identifier(node, "eval") && classify(tree, node, parents).usage.is_defined {
            found = true;
        }
        !found
    });
    found
}

fn has_use_strict(tree: &Tree, block: NodeId) -> bool {
    tree.list(block, "body")
        .iter()
        .take_while(|s| tree.get(**s, "directive").is_some())
        .any(|s| tree.str(*s, "directive") == Some("use strict"))
}

fn is_strict(tree: &Tree, parents: &[NodeId]) -> bool {
    tree.is_module()
        || parents.iter().any(|p| {
            let kind = tree.kind(*p);
            kind == Kind::ClassBody || (kind.is_block() && has_use_strict(tree, *p))
        })
}

fn is_method(tree: &Tree, parents: &[NodeId]) -> bool {
    parents.first().is_some_and(|p| match tree.kind(*p) {
        Kind::MethodDefinition => true,
        Kind::Property => {
            tree.flag(*p, "method") || matches!(tree.str(*p, "kind"), Some("get" | "set"))
        }
        _ => false,
    })
}

impl Transform for Eval {
    fn name(&self) -> &'static str {
        "Eval"
    }

    fn priority(&self) -> u32 {
        11
    }

    fn prepare(
        &mut self,
        tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        self.shadowed = declares_eval(tree);
        if self.shadowed {
            debug!("program declares eval, skipping");
        }
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, parents: &[NodeId], cx: &mut Context) -> bool {
        if self.shadowed {
            return false;
        }
        let eligible = match tree.kind(node) {
            Kind::FunctionExpression => !is_method(tree, parents),
            Kind::FunctionDeclaration => {
                let in_context_body = match parents {
                    [block, ..] if tree.is(*block, Kind::Program) => true,
                    [block, owner, ..] => {
                        tree.is(*block, Kind::BlockStatement) && tree.kind(*owner).is_function()
                    }
                    _ => false,
                };
                in_context_body && !is_strict(tree, parents)
            }
            _ => false,
        };
        eligible && cx.chance(|o| &o.eval)
    }

    fn transform(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> Result<Visit> {
        Ok(Visit::OnExit)
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<()> {
        cx.dynamically_obfuscate(tree, node, parents)?;

        let declaration = tree.is(node, Kind::FunctionDeclaration);
        let code = Codegen::new().with_compact(true).build(tree, node);
        let source = if declaration { code } else { format!("({code})") };

        let callee = tree.identifier("eval");
        let literal = tree.string(&source);
        let call = tree.call(callee, vec![literal]);

        if !declaration {
            tree.replace(node, call, "Eval");
            return Ok(());
        }

        let block = parents[0];
        tree.delete_direct(node, block)?;
        let statement = tree.expression_statement(call);
        match self.hoisted.get(&block) {
            Some(previous) if tree.list(block, "body").contains(previous) => {
                insert_after(tree, *previous, &[block], vec![statement])?;
            }
            _ => prepend(tree, block, &[], vec![statement])?,
        }
        self.hoisted.insert(block, statement);
        Ok(())
    }
}
