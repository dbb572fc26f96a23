//! Statement-list rewrites: declaration merging, assignment folding and
//! expression fusion.

use rustc_hash::FxHashSet;

use super::flow::truncate;
use crate::Result;
use crate::traverse::scan;
use crate::transform::{Context, Transform, Visit};
use crate::tree::{Kind, NodeId, Tree, Value};

pub struct MinifyBlock;

impl MinifyBlock {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for MinifyBlock {
    fn default() -> Self {
        Self::new()
    }
}

fn statement_key(kind: Kind) -> Option<&'static str> {
    match kind {
        Kind::Program | Kind::BlockStatement | Kind::StaticBlock => Some("body"),
        Kind::SwitchCase => Some("consequent"),
        _ => None,
    }
}

fn is_directive(tree: &Tree, statement: NodeId) -> bool {
    tree.get(statement, "directive").is_some()
}

/// A nested block whose statements can move into the enclosing list
/// without changing scoping or creating a directive.
fn is_flattenable(tree: &Tree, block: NodeId) -> bool {
    let body = tree.list(block, "body");
    let starts_with_string = body.first().is_some_and(|first| {
        tree.is(*first, Kind::ExpressionStatement)
            && tree
                .child(*first, "expression")
                .is_some_and(|e| tree.string_value(e).is_some())
    });
    !starts_with_string
        && body.iter().all(|s| match tree.kind(*s) {
            Kind::VariableDeclaration => tree.str(*s, "kind") == Some("var"),
            Kind::FunctionDeclaration | Kind::ClassDeclaration => false,
            _ => true,
        })
}

/// Expressions whose evaluation cannot run user code.
fn is_inert(tree: &Tree, expression: NodeId) -> bool {
    let mut inert = true;
    scan(tree, expression, &[], |node, _| {
        if !inert {
            return false;
        }
        match tree.kind(node) {
            Kind::Literal | Kind::Identifier | Kind::TemplateElement => true,
            Kind::FunctionExpression | Kind::ArrowFunctionExpression => false,
            Kind::ArrayExpression
            | Kind::LogicalExpression
            | Kind::ConditionalExpression
            | Kind::SequenceExpression => true,
            Kind::ObjectExpression => true,
            Kind::Property => {
                inert = !tree.flag(node, "computed");
                inert
            }
            Kind::TemplateLiteral => {
                inert = tree.list(node, "expressions").is_empty();
                inert
            }
            Kind::UnaryExpression => {
                inert = matches!(tree.str(node, "operator"), Some("!" | "typeof" | "void"));
                inert
            }
            _ => {
                inert = false;
                false
            }
        }
    });
    inert
}

fn mentions_any(tree: &Tree, expression: NodeId, names: &dyn Fn(&str) -> bool) -> bool {
    let mut found = false;
    scan(tree, expression, &[], |node, _| {
        if tree.name(node).is_some_and(|n| names(n)) {
            found = true;
        }
        !found
    });
    found
}

/// Folds `x = value;` into a directly preceding `var x;` or `let x;`.
///
/// The assigned value must not mention `x` or a configured global anywhere,
/// nested functions included. An existing literal initializer, or a `let`
/// binding, additionally requires a value that cannot run code, so nothing
/// can observe the skipped intermediate state.
fn fold_assignment(
    tree: &mut Tree,
    declaration: NodeId,
    statement: NodeId,
    globals: &FxHashSet<String>,
) -> bool {
    if !tree.is(declaration, Kind::VariableDeclaration) || !tree.is(statement, Kind::ExpressionStatement) {
        return false;
    }
    let kind = tree.str(declaration, "kind").unwrap_or("var");
    if kind == "const" {
        return false;
    }
    let Some(&declarator) = tree.list(declaration, "declarations").last() else {
        return false;
    };
    let Some(id) = tree.child(declarator, "id") else {
        return false;
    };
    let Some(name) = tree.name(id).map(str::to_string) else {
        return false;
    };
    let Some(assignment) = tree.child(statement, "expression") else {
        return false;
    };
    if !tree.is(assignment, Kind::AssignmentExpression) || tree.str(assignment, "operator") != Some("=") {
        return false;
    }
    let (Some(left), Some(right)) = (tree.child(assignment, "left"), tree.child(assignment, "right")) else {
        return false;
    };
    if !tree.is_identifier(left, &name) {
        return false;
    }

    let init = tree.child(declarator, "init");
    let init_is_literal = init.is_some_and(|i| tree.is(i, Kind::Literal));
    if init.is_some() && !init_is_literal {
        return false;
    }
    if mentions_any(tree, right, &|n| n == name || globals.contains(n)) {
        return false;
    }
    if (init.is_some() || kind == "let") && !is_inert(tree, right) {
        return false;
    }
    tree.set(declarator, "init", right);
    true
}

/// Appends the declarators of `next` to `previous` when both declare with
/// the same keyword.
fn merge_declarations(tree: &mut Tree, previous: NodeId, next: NodeId) -> bool {
    if !tree.is(previous, Kind::VariableDeclaration)
        || !tree.is(next, Kind::VariableDeclaration)
        || tree.str(previous, "kind") != tree.str(next, "kind")
    {
        return false;
    }
    let moved = tree.list(next, "declarations").to_vec();
    if let Some(declarations) = tree.list_mut(previous, "declarations") {
        declarations.extend(moved);
    }
    true
}

fn sequence_items(tree: &Tree, expression: NodeId) -> Vec<NodeId> {
    if tree.is(expression, Kind::SequenceExpression) {
        tree.list(expression, "expressions").to_vec()
    } else {
        vec![expression]
    }
}

fn join(tree: &mut Tree, first: NodeId, second: NodeId) -> NodeId {
    let mut items = sequence_items(tree, first);
    items.extend(sequence_items(tree, second));
    tree.sequence(items)
}

impl Transform for MinifyBlock {
    fn name(&self) -> &'static str {
        "MinifyBlock"
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
        statement_key(tree.kind(node)).is_some()
    }

    fn transform(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> Result<Visit> {
        Ok(Visit::OnExit)
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<()> {
        let Some(key) = statement_key(tree.kind(node)) else {
            return Ok(());
        };

        let mut flat = Vec::new();
        for statement in tree.list(node, key).to_vec() {
            match tree.kind(statement) {
                Kind::EmptyStatement => {}
                Kind::BlockStatement if is_flattenable(tree, statement) => {
                    flat.extend_from_slice(tree.list(statement, "body"));
                }
                _ => flat.push(statement),
            }
        }

        // rewrites below this list can turn a branch into a `return`
        if let Some(kept) = truncate(tree, &flat) {
            flat = kept;
        }

        let globals = &cx.options.global_variables;
        let mut out: Vec<NodeId> = Vec::with_capacity(flat.len());
        for statement in flat {
            let Some(&previous) = out.last() else {
                out.push(statement);
                continue;
            };
            if fold_assignment(tree, previous, statement, globals)
                || merge_declarations(tree, previous, statement)
            {
                continue;
            }
            let fusable = tree.is(previous, Kind::ExpressionStatement) && !is_directive(tree, previous);
            if fusable && tree.is(statement, Kind::ExpressionStatement) && !is_directive(tree, statement) {
                let (Some(first), Some(second)) = (
                    tree.child(previous, "expression"),
                    tree.child(statement, "expression"),
                ) else {
                    out.push(statement);
                    continue;
                };
                let joined = join(tree, first, second);
                tree.set(previous, "expression", joined);
                continue;
            }
            if fusable && tree.is(statement, Kind::ReturnStatement) {
                let (Some(first), Some(argument)) = (
                    tree.child(previous, "expression"),
                    tree.child(statement, "argument"),
                ) else {
                    out.push(statement);
                    continue;
                };
                let joined = join(tree, first, argument);
                tree.set(statement, "argument", joined);
                out.pop();
            }
            out.push(statement);
        }

        if out.as_slice() != tree.list(node, key) {
            tree.set(node, key, Value::List(out));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Codegen;
    use crate::options::Options;
    use crate::parser::parse;
    use crate::transform::apply;

    fn run_minify_block(code: &str) -> String {
        let mut tree = parse(code, false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options::default());
        apply(&mut MinifyBlock::new(), &mut tree, root, &[], &mut cx).unwrap();
        Codegen::new().with_compact(true).build(&tree, root)
    }

    #[test]
    fn test_declarations_merge() {
        assert_eq!(run_minify_block("var a = 1; var b = 2; let c; let d;"), "var a=1,b=2;let c,d;");
        assert_eq!(run_minify_block("var a; let b;"), "var a;let b;");
    }

    #[test]
    fn test_expression_fusion() {
        assert_eq!(run_minify_block("a(); b(); c();"), "a(),b(),c();");
        assert_eq!(
            run_minify_block("function f() { a(); b(); return c; }"),
            "function f(){return a(),b(),c;}"
        );
        assert_eq!(run_minify_block("function f() { a(); return; }"), "function f(){a();return;}");
    }

    #[test]
    fn test_directives_are_not_fused() {
        assert_eq!(
            run_minify_block("function f() { 'use strict'; a(); b(); }"),
            "function f(){\"use strict\";a(),b();}"
        );
    }

    #[test]
    fn test_empty_statements_and_blocks() {
        assert_eq!(run_minify_block(";a();;{ b(); }"), "a(),b();");
        assert_eq!(run_minify_block("{ let x = 1; f(x); } g();"), "{let x=1;f(x);}g();");
    }

    #[test]
    fn test_unreachable_statements_are_dropped() {
        assert_eq!(
            run_minify_block("function f() { { return 1; } g(); var x = 2; }"),
            "function f(){return 1;var x;}"
        );
    }

    #[test]
    fn test_assignment_folding() {
        assert_eq!(run_minify_block("var x; x = f();"), "var x=f();");
        assert_eq!(run_minify_block("var y = 1, x; x = 2;"), "var y=1,x=2;");
        assert_eq!(run_minify_block("var x = 0; x = a + 1;"), "var x=0;x=a+1;");
        assert_eq!(run_minify_block("var x = 0; x = a || 1;"), "var x=a||1;");
    }

    #[test]
    fn test_assignment_folding_guards() {
        // reads the folded name
        assert_eq!(run_minify_block("var x; x = x || 1;"), "var x;x=x||1;");
        // inside a nested function too
        assert_eq!(
            run_minify_block("var x; x = function () { return x; };"),
            "var x;x=function(){return x;};"
        );
        // configured globals
        assert_eq!(run_minify_block("var x; x = window.y;"), "var x;x=window.y;");
        // not the last declarator
        assert_eq!(run_minify_block("var x, y; x = 1;"), "var x,y;x=1;");
        // const and lets with calls
        assert_eq!(run_minify_block("const x = 1; x = 2;"), "const x=1;x=2;");
        assert_eq!(run_minify_block("let x; x = f();"), "let x;x=f();");
        assert_eq!(run_minify_block("let x; x = [1, 2];"), "let x=[1,2];");
    }
}
