//! Always-on normalization that later passes rely on.

use super::{Composition, Context, Label, Transform, Visit};
use crate::Result;
use crate::tree::{Kind, NodeId, Tree};

pub struct Preparation {
    composition: Composition,
}

impl Preparation {
    pub fn new() -> Self {
        Self {
            composition: Composition {
                before: vec![Box::new(Block::new()), Box::new(Label::new())],
                ..Composition::default()
            },
        }
    }
}

impl Default for Preparation {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Preparation {
    fn name(&self) -> &'static str {
        "Preparation"
    }

    fn priority(&self) -> u32 {
        0
    }

    fn composition(&mut self) -> Option<&mut Composition> {
        Some(&mut self.composition)
    }

    fn matches(&mut self, _: &Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        false
    }

    fn transform(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> Result<Visit> {
        Ok(Visit::Continue)
    }
}

/// Gives every `if`, `else`, loop and `with` a block body.
pub struct Block;

impl Block {
    pub const fn new() -> Self {
        Self
    }

    fn body_fields(kind: Kind) -> &'static [&'static str] {
        match kind {
            Kind::IfStatement => &["consequent", "alternate"],
            Kind::WhileStatement
            | Kind::DoWhileStatement
            | Kind::ForStatement
            | Kind::ForInStatement
            | Kind::ForOfStatement
            | Kind::WithStatement => &["body"],
            _ => &[],
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Block {
    fn name(&self) -> &'static str {
        "Block"
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        !Self::body_fields(tree.kind(node)).is_empty()
    }

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<Visit> {
        for field in Self::body_fields(tree.kind(node)) {
            if let Some(body) = tree.child(node, field) {
                if !tree.is(body, Kind::BlockStatement) {
                    let block = tree.block(vec![body]);
                    tree.set(node, field, block);
                }
            }
        }
        Ok(Visit::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Codegen;
    use crate::options::Options;
    use crate::parser::parse;
    use crate::transform::apply;

    fn run_preparation(code: &str) -> String {
        let mut tree = parse(code, false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options {
            seed: Some(1),
            ..Options::default()
        });
        apply(&mut Preparation::new(), &mut tree, root, &[], &mut cx).unwrap();
        Codegen::new().with_compact(true).build(&tree, root)
    }

    #[test]
    fn test_bodies_become_blocks() {
        let output = run_preparation("if (a) b(); else if (c) d(); while (x) y(); for (;;) z();");
        assert_eq!(
            output,
            "if(a){b();}else{if(c){d();}}while(x){y();}for(;;){z();}"
        );
    }

    #[test]
    fn test_existing_blocks_untouched() {
        let output = run_preparation("if (a) { b(); } do { c(); } while (d);");
        assert_eq!(output, "if(a){b();}do{c();}while(d);");
    }

    #[test]
    fn test_label_runs_after_block() {
        let output = run_preparation("while (a) if (b) break;");
        assert!(output.starts_with("__p_"), "got: {}", output);
        assert!(output.contains(":while(a){if(b){break __p_"), "got: {}", output);
    }
}
