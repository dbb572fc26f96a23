//! Size-reducing rewrites that keep behavior.
//!
//! `MinifyFlow` first removes unreachable code in its own walk. The main walk
//! then runs post-order, so every rewrite sees already minified children, and
//! `MinifyBlock` tidies each statement list once its statements are done.

pub mod block;
pub mod flow;

pub use block::MinifyBlock;
pub use flow::MinifyFlow;

use rustc_hash::FxHashSet;

use super::{Composition, Context, Transform, Visit};
use crate::Result;
use crate::analysis::{classify, is_valid_identifier, references_this_or_arguments};
use crate::traverse::scan;
use crate::tree::{Kind, Node, NodeId, Tree, Value};

/// Truthiness of a test known without running it.
pub fn truthiness(tree: &Tree, node: NodeId) -> Option<bool> {
    match tree.kind(node) {
        Kind::Literal => match tree.get(node, "value")? {
            Value::Bool(b) => Some(*b),
            Value::Num(n) => Some(*n != 0.0 && !n.is_nan()),
            Value::Str(s) => Some(!s.is_empty()),
            Value::Null => Some(false),
            _ => None,
        },
        Kind::UnaryExpression => {
            let argument = tree.child(node, "argument")?;
            match tree.str(node, "operator")? {
                "!" => truthiness(tree, argument).map(|t| !t),
                "void" if tree.is(argument, Kind::Literal) => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

pub struct Minify {
    composition: Composition,
    /// Global names the program rebinds, so they are left alone.
    shadowed: FxHashSet<&'static str>,
}

impl Minify {
    pub fn new() -> Self {
        Self {
            composition: Composition {
                before: vec![Box::new(MinifyFlow::new())],
                concurrent: vec![Box::new(MinifyBlock::new())],
                ..Composition::default()
            },
            shadowed: FxHashSet::default(),
        }
    }
}

impl Default for Minify {
    fn default() -> Self {
        Self::new()
    }
}

const REPLACED_GLOBALS: [&str; 2] = ["undefined", "Infinity"];

/// The lone statement of a branch, looking through a one-statement block.
fn single(tree: &Tree, branch: NodeId) -> Option<NodeId> {
    if tree.is(branch, Kind::BlockStatement) {
        match tree.list(branch, "body") {
            [only] => Some(*only),
            _ => None,
        }
    } else {
        Some(branch)
    }
}

/// Statements that can end in an `if` without `else` and would capture a
/// following `else` once printed without braces.
fn can_dangle(kind: Kind) -> bool {
    kind == Kind::IfStatement
        || kind.is_loop()
        || matches!(kind, Kind::LabeledStatement | Kind::WithStatement)
}

fn can_stand_alone(tree: &Tree, statement: NodeId) -> bool {
    match tree.kind(statement) {
        Kind::VariableDeclaration => tree.str(statement, "kind") == Some("var"),
        Kind::FunctionDeclaration | Kind::ClassDeclaration => false,
        _ => true,
    }
}

/// Assignment targets that can move in front of the test: a member target
/// would have its object evaluated before the test could change it.
fn is_simple_target(tree: &Tree, node: NodeId) -> bool {
    tree.is(node, Kind::Identifier)
}

/// Functions whose value is only ever called: call arguments and immediately
/// invoked callees. Anywhere else the function may be constructed with `new`
/// or have its `prototype` read, which arrows lack.
fn is_call_only(tree: &Tree, node: NodeId, parents: &[NodeId]) -> bool {
    parents.first().is_some_and(|parent| {
        tree.is(*parent, Kind::CallExpression)
            && matches!(tree.field_of(*parent, node), Some("arguments" | "callee"))
    })
}

fn expression_of(tree: &Tree, statement: NodeId) -> Option<NodeId> {
    if tree.is(statement, Kind::ExpressionStatement) && tree.get(statement, "directive").is_none() {
        tree.child(statement, "expression")
    } else {
        None
    }
}

impl Minify {
    fn unwrap_bodies(tree: &mut Tree, node: NodeId) {
        let has_alternate = tree.child(node, "alternate").is_some();
        let fields: &[&str] = match tree.kind(node) {
            Kind::IfStatement => &["consequent", "alternate"],
            kind if kind.is_loop() => &["body"],
            _ => &[],
        };
        for field in fields {
            let Some(body) = tree.child(node, field) else {
                continue;
            };
            if !tree.is(body, Kind::BlockStatement) {
                continue;
            }
            let Some(statement) = single(tree, body) else {
                continue;
            };
            if !can_stand_alone(tree, statement) {
                continue;
            }
            if *field == "consequent" && has_alternate && can_dangle(tree.kind(statement)) {
                continue;
            }
            tree.replace(body, statement, "Minify");
        }
    }

    /// `if` statements built from expression statements or returns become
    /// `&&`, ternaries, or a single assignment or return.
    fn if_to_expression(tree: &mut Tree, node: NodeId) {
        let (Some(test), Some(consequent)) = (tree.child(node, "test"), tree.child(node, "consequent"))
        else {
            return;
        };
        let Some(yes) = single(tree, consequent) else {
            return;
        };
        let alternate = tree.child(node, "alternate");

        let Some(alternate) = alternate else {
            if let Some(expression) = expression_of(tree, yes) {
                let logical = tree.logical("&&", test, expression);
                let statement = tree.expression_statement(logical);
                tree.replace(node, statement, "Minify");
            }
            return;
        };
        let Some(no) = single(tree, alternate) else {
            return;
        };

        if let (Some(a), Some(b)) = (expression_of(tree, yes), expression_of(tree, no)) {
            let same_target = tree.is(a, Kind::AssignmentExpression)
                && tree.is(b, Kind::AssignmentExpression)
                && tree.str(a, "operator") == Some("=")
                && tree.str(b, "operator") == Some("=")
                && match (tree.child(a, "left"), tree.child(b, "left")) {
                    (Some(l1), Some(l2)) => {
                        is_simple_target(tree, l1) && tree.structurally_equal(l1, l2)
                    }
                    _ => false,
                };
            let expression = if same_target {
                let (Some(left), Some(r1), Some(r2)) =
                    (tree.child(a, "left"), tree.child(a, "right"), tree.child(b, "right"))
                else {
                    return;
                };
                let choice = tree.conditional(test, r1, r2);
                tree.assign("=", left, choice)
            } else {
                tree.conditional(test, a, b)
            };
            let statement = tree.expression_statement(expression);
            tree.replace(node, statement, "Minify");
            return;
        }

        if tree.is(yes, Kind::ReturnStatement) && tree.is(no, Kind::ReturnStatement) {
            let (Some(a), Some(b)) = (tree.child(yes, "argument"), tree.child(no, "argument")) else {
                return;
            };
            let choice = tree.conditional(test, a, b);
            let statement = tree.return_statement(Some(choice));
            tree.replace(node, statement, "Minify");
        }
    }

    fn function_to_arrow(tree: &mut Tree, node: NodeId, parents: &[NodeId]) {
        if tree.flag(node, "generator") || tree.child(node, "id").is_some() {
            return;
        }
        if !is_call_only(tree, node, parents) || references_this_or_arguments(tree, node) {
            return;
        }
        let Some(body) = tree.child(node, "body") else {
            return;
        };
        let statements = tree.list(body, "body").to_vec();
        if statements.iter().any(|s| tree.get(*s, "directive").is_some()) {
            return;
        }
        let params = tree.list(node, "params").to_vec();
        let is_async = tree.flag(node, "async");

        let (body, expression) = match statements.as_slice() {
            [only] if tree.is(*only, Kind::ReturnStatement) => match tree.child(*only, "argument") {
                Some(argument) => (argument, true),
                None => (body, false),
            },
            _ => (body, false),
        };
        let arrow = tree.add(
            Node::new(Kind::ArrowFunctionExpression)
                .with("params", params)
                .with("body", body)
                .with("expression", expression)
                .with("async", is_async),
        );
        tree.replace(node, arrow, "Minify");
    }

    fn is_global_reference(&self, tree: &Tree, node: NodeId, parents: &[NodeId]) -> bool {
        let Some(name) = tree.name(node) else {
            return false;
        };
        if !REPLACED_GLOBALS.contains(&name) || self.shadowed.contains(name) {
            return false;
        }
        let info = classify(tree, node, parents);
        info.usage.is_referenced && !info.usage.is_modified && !info.usage.is_defined
    }
}

impl Transform for Minify {
    fn name(&self) -> &'static str {
        "Minify"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn composition(&mut self) -> Option<&mut Composition> {
        Some(&mut self.composition)
    }

    fn prepare(
        &mut self,
        tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        let mut shadowed = FxHashSet::default();
        scan(tree, tree.root(), &[], |node, parents| {
            if let Some(name) = tree.name(node) {
                if let Some(global) = REPLACED_GLOBALS.iter().find(|g| **g == name) {
                    if classify(tree, node, parents).usage.is_defined {
                        shadowed.insert(*global);
                    }
                }
            }
            true
        });
        self.shadowed = shadowed;
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, parents: &[NodeId], _: &mut Context) -> bool {
        match tree.kind(node) {
            Kind::IfStatement | Kind::FunctionExpression => true,
            kind if kind.is_loop() => true,
            Kind::MemberExpression => tree.flag(node, "computed"),
            Kind::Property | Kind::MethodDefinition | Kind::PropertyDefinition => {
                !tree.flag(node, "computed")
            }
            Kind::UnaryExpression => tree.str(node, "operator") == Some("!"),
            Kind::Identifier => self.is_global_reference(tree, node, parents),
            Kind::Literal => matches!(tree.get(node, "value"), Some(Value::Bool(_))),
            _ => false,
        }
    }

    fn transform(&mut self, _: &mut Tree, _: NodeId, _: &[NodeId], _: &mut Context) -> Result<Visit> {
        Ok(Visit::OnExit)
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        match tree.kind(node) {
            Kind::IfStatement => {
                Self::unwrap_bodies(tree, node);
                Self::if_to_expression(tree, node);
            }
            kind if kind.is_loop() => Self::unwrap_bodies(tree, node),
            Kind::FunctionExpression => Self::function_to_arrow(tree, node, parents),
            Kind::MemberExpression => {
                let Some(property) = tree.child(node, "property") else {
                    return Ok(());
                };
                let Some(name) = tree.string_value(property).map(str::to_string) else {
                    return Ok(());
                };
                if is_valid_identifier(&name) {
                    let identifier = tree.identifier(&name);
                    tree.replace(property, identifier, "Minify");
                    tree.set(node, "computed", false);
                }
            }
            Kind::Property | Kind::MethodDefinition | Kind::PropertyDefinition => {
                let Some(key) = tree.child(node, "key") else {
                    return Ok(());
                };
                let Some(name) = tree.string_value(key).map(str::to_string) else {
                    return Ok(());
                };
                if is_valid_identifier(&name) {
                    let identifier = tree.identifier(&name);
                    tree.replace(key, identifier, "Minify");
                }
            }
            Kind::UnaryExpression => {
                // `!!x` where only truthiness is observed
                let Some(inner) = tree.child(node, "argument") else {
                    return Ok(());
                };
                let double = tree.is(inner, Kind::UnaryExpression) && tree.str(inner, "operator") == Some("!");
                let in_test = parents.first().is_some_and(|p| {
                    matches!(
                        tree.kind(*p),
                        Kind::IfStatement
                            | Kind::WhileStatement
                            | Kind::DoWhileStatement
                            | Kind::ForStatement
                            | Kind::ConditionalExpression
                    ) && tree.field_of(*p, node) == Some("test")
                });
                if double && in_test {
                    if let Some(value) = tree.child(inner, "argument") {
                        tree.replace(node, value, "Minify");
                    }
                }
            }
            Kind::Identifier => {
                let replacement = if tree.name(node) == Some("undefined") {
                    let zero = tree.number(0.0);
                    tree.unary("void", zero)
                } else {
                    let one = tree.number(1.0);
                    let zero = tree.number(0.0);
                    tree.binary("/", one, zero)
                };
                tree.replace(node, replacement, "Minify");
            }
            Kind::Literal => {
                if let Some(Value::Bool(value)) = tree.get(node, "value") {
                    let digit = if *value { 0.0 } else { 1.0 };
                    let number = tree.number(digit);
                    let negated = tree.unary("!", number);
                    tree.replace(node, negated, "Minify");
                }
            }
            _ => {}
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

    fn run_minify(code: &str) -> String {
        let mut tree = parse(code, false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options::default());
        apply(&mut Minify::new(), &mut tree, root, &[], &mut cx).unwrap();
        Codegen::new().with_compact(true).build(&tree, root)
    }

    #[test]
    fn test_function_to_arrow() {
        assert_eq!(run_minify("x.map(function (a) { return a * 2; });"), "x.map((a)=>a*2);");
        assert_eq!(
            run_minify("run(async function (a, b) { f(a); g(b); });"),
            "run(async(a,b)=>{f(a),g(b);});"
        );
        assert_eq!(run_minify("run(function () { return { a: 1 }; });"), "run(()=>({a:1}));");
        let iife = run_minify("(function () { a(); })();");
        assert!(iife.contains("=>"), "got: {}", iife);
        assert!(parse(&iife, false).is_ok(), "got: {}", iife);
    }

    #[test]
    fn test_constructible_functions_stay_functions() {
        let code = "function Pt(x) { this.x = x; } var P = function () {}; console.log(new Pt(3).x, typeof new P());";
        assert_eq!(
            run_minify(code),
            "function Pt(x){this.x=x;}var P=function(){};console.log(new Pt(3).x,typeof new P());"
        );
        for code in [
            "x = function (a) { return a * 2; };",
            "F.prototype.m = function () { return 1; };",
            "x = { m: function () { return 1; } };",
            "export_(function () {}.prototype);",
        ] {
            let output = run_minify(code);
            assert!(output.contains("function"), "{} -> {}", code, output);
        }
    }

    #[test]
    fn test_function_to_arrow_guards() {
        for code in [
            "x = function () { return this; };",
            "x = function () { return () => arguments[0]; };",
            "x = function f() { return f; };",
            "x = function* () { yield 1; };",
            "x = new function () { return 1; }();",
            "x = { m: function () { return new.target; } };",
        ] {
            let output = run_minify(code);
            assert!(output.contains("function"), "{} -> {}", code, output);
        }
        // methods stay methods
        assert_eq!(run_minify("x = { m() { return 1; } };"), "x={m(){return 1;}};");
    }

    #[test]
    fn test_if_rewrites() {
        assert_eq!(run_minify("if (a) { b(); }"), "a&&b();");
        assert_eq!(run_minify("if (a) { b(); } else { c(); }"), "a?b():c();");
        assert_eq!(run_minify("if (a) { x = 1; } else { x = 2; }"), "x=a?1:2;");
        assert_eq!(run_minify("if (a) { x.y = 1; } else { x.z = 2; }"), "a?x.y=1:x.z=2;");
        // the test runs before `x` is read
        assert_eq!(run_minify("if (t()) { x.y = 1; } else { x.y = 2; }"), "t()?x.y=1:x.y=2;");
        assert_eq!(
            run_minify("function f() { if (a) { return 1; } else { return 2; } }"),
            "function f(){return a?1:2;}"
        );
    }

    #[test]
    fn test_single_statement_bodies() {
        assert_eq!(run_minify("for (;;) { f(); }"), "for(;;)f();");
        assert_eq!(run_minify("while (a) { let b = 1; }"), "while(a){let b=1;}");
        assert_eq!(
            run_minify("if (a) { if (b) { c(); } } else { for (;;) {} }"),
            "if(a)b&&c();else for(;;){}"
        );
        // the loop would end in an open `if` and capture the `else`
        assert_eq!(
            run_minify("if (a) { while (b) { if (c) { d(); } } } else { e(); }"),
            "if(a){while(b)c&&d();}else e();"
        );
    }

    #[test]
    fn test_member_and_key_normalization() {
        assert_eq!(run_minify("a['b'] = c['d-e'];"), "a.b=c[\"d-e\"];");
        assert_eq!(run_minify("x = { 'a': 1, 'b-c': 2, default: 3 };"), "x={a:1,\"b-c\":2,default:3};");
        assert_eq!(run_minify("x = a['default'];"), "x=a[\"default\"];");
    }

    #[test]
    fn test_literals_and_globals() {
        assert_eq!(run_minify("x = [true, false, undefined, Infinity];"), "x=[!0,!1,void 0,1/0];");
        assert_eq!(run_minify("var undefined = 1; x = undefined;"), "var undefined=1;x=undefined;");
        assert_eq!(run_minify("x = { undefined: 1 }.undefined;"), "x={undefined:1}.undefined;");
    }

    #[test]
    fn test_double_negation_in_tests() {
        assert_eq!(run_minify("while (!!a) { f(); }"), "while(a)f();");
        assert_eq!(run_minify("x = !!a;"), "x=!!a;");
    }

    #[test]
    fn test_flow_runs_first() {
        assert_eq!(run_minify("if (false) { a(); } else { b(); } c();"), "b(),c();");
        assert_eq!(
            run_minify("function f() { return 1; g(); } x = true ? y : z;"),
            "function f(){return 1;}x=y;"
        );
    }

    #[test]
    fn test_returns_made_by_rewrites_end_the_block() {
        assert_eq!(
            run_minify("function pick(flag) { if (flag) { return 1; } else { return 2; } cleanup(); }"),
            "function pick(flag){return flag?1:2;}"
        );
    }

    #[test]
    fn test_output_reparses() {
        let code = "var a = 1; var b; b = 2; if (a) { console.log('x'); } else { console.log(b['c']); } function f() { if (a) return 1; else return 2; }";
        let output = run_minify(code);
        assert!(parse(&output, false).is_ok(), "got: {}", output);
        assert_eq!(
            output,
            "var a=1,b=2;a?console.log(\"x\"):console.log(b.c);function f(){return a?1:2;}"
        );
    }
}
