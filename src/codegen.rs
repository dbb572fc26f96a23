//! Prints a [`Tree`] back to JavaScript source.
//!
//! Parentheses are derived from operator precedence rather than kept from
//! the input, so rewritten sub-trees never need to track them.

use crate::output::Output;
use crate::traverse::scan;
use crate::tree::{Kind, NodeId, Tree, Value};

pub struct Codegen {
    compact: bool,
    indent: String,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            compact: false,
            indent: "  ".to_string(),
        }
    }

    #[must_use]
    pub const fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    #[must_use]
    pub fn with_indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Prints `node`, which may be a `Program`, any statement or any
    /// expression.
    pub fn build(&self, tree: &Tree, node: NodeId) -> String {
        let mut printer = Printer {
            tree,
            out: Output::new(self.indent.clone(), self.compact),
        };
        match tree.kind(node) {
            Kind::Program => printer.statement_list(tree.list(node, "body")),
            kind if is_statement(kind) => printer.statement(node),
            _ => printer.expression(node, 0),
        }
        printer.out.finish()
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

fn is_statement(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::ExpressionStatement
            | Kind::BlockStatement
            | Kind::EmptyStatement
            | Kind::DebuggerStatement
            | Kind::WithStatement
            | Kind::ReturnStatement
            | Kind::LabeledStatement
            | Kind::BreakStatement
            | Kind::ContinueStatement
            | Kind::IfStatement
            | Kind::SwitchStatement
            | Kind::ThrowStatement
            | Kind::TryStatement
            | Kind::WhileStatement
            | Kind::DoWhileStatement
            | Kind::ForStatement
            | Kind::ForInStatement
            | Kind::ForOfStatement
            | Kind::FunctionDeclaration
            | Kind::VariableDeclaration
            | Kind::ClassDeclaration
            | Kind::ImportDeclaration
            | Kind::ExportNamedDeclaration
            | Kind::ExportDefaultDeclaration
            | Kind::ExportAllDeclaration
    )
}

/// Quotes `value` as a double-quoted JavaScript string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn binary_precedence(operator: &str) -> u8 {
    match operator {
        "??" => 3,
        "||" => 4,
        "&&" => 5,
        "|" => 6,
        "^" => 7,
        "&" => 8,
        "==" | "!=" | "===" | "!==" => 9,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 10,
        "<<" | ">>" | ">>>" => 11,
        "+" | "-" => 12,
        "*" | "/" | "%" => 13,
        "**" => 14,
        _ => 0,
    }
}

const UNARY: u8 = 15;
const POSTFIX: u8 = 16;
const CALL: u8 = 18;
const PRIMARY: u8 = 19;

struct Printer<'t> {
    tree: &'t Tree,
    out: Output,
}

impl Printer<'_> {
    fn token(&mut self, text: &str) {
        self.out.add_token(text);
    }

    fn space(&mut self) {
        self.out.add_space();
    }

    fn newline(&mut self) {
        self.out.add_newline();
    }

    fn comma(&mut self) {
        self.token(",");
        self.space();
    }

    fn precedence(&self, id: NodeId) -> u8 {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::SequenceExpression => 0,
            Kind::AssignmentExpression | Kind::ArrowFunctionExpression | Kind::YieldExpression => 1,
            Kind::ConditionalExpression => 2,
            Kind::BinaryExpression | Kind::LogicalExpression => {
                binary_precedence(tree.str(id, "operator").unwrap_or(""))
            }
            Kind::UnaryExpression | Kind::AwaitExpression => UNARY,
            Kind::UpdateExpression => POSTFIX,
            Kind::CallExpression
            | Kind::NewExpression
            | Kind::MemberExpression
            | Kind::ChainExpression
            | Kind::TaggedTemplateExpression
            | Kind::ImportExpression
            | Kind::MetaProperty => CALL,
            Kind::Literal => match tree.number_value(id) {
                Some(n) if !n.is_finite() => 13,
                Some(n) if n.is_sign_negative() => UNARY,
                _ => PRIMARY,
            },
            _ => PRIMARY,
        }
    }

    /// Leftmost token of the expression would be `{`, `function` or `class`.
    fn starts_ambiguously(&self, id: NodeId) -> bool {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::ObjectExpression
            | Kind::FunctionExpression
            | Kind::ClassExpression
            | Kind::ObjectPattern => true,
            Kind::CallExpression => self.leftmost(id, "callee"),
            Kind::MemberExpression => self.leftmost(id, "object"),
            Kind::TaggedTemplateExpression => self.leftmost(id, "tag"),
            Kind::BinaryExpression | Kind::LogicalExpression | Kind::AssignmentExpression => {
                self.leftmost(id, "left")
            }
            Kind::ConditionalExpression => self.leftmost(id, "test"),
            Kind::ChainExpression => self.leftmost(id, "expression"),
            Kind::UpdateExpression if !tree.flag(id, "prefix") => self.leftmost(id, "argument"),
            Kind::SequenceExpression => tree
                .list(id, "expressions")
                .first()
                .is_some_and(|first| self.starts_ambiguously(*first)),
            _ => false,
        }
    }

    fn leftmost(&self, id: NodeId, key: &str) -> bool {
        self.tree
            .child(id, key)
            .is_some_and(|child| self.starts_ambiguously(child))
    }

    fn contains_in(&self, id: NodeId) -> bool {
        let tree = self.tree;
        let mut found = false;
        scan(tree, id, &[], |node, _| {
            if tree.kind(node).is_function() || tree.kind(node).is_class() {
                return false;
            }
            if tree.is(node, Kind::BinaryExpression) && tree.str(node, "operator") == Some("in") {
                found = true;
            }
            !found
        });
        found
    }

    fn statement_list(&mut self, statements: &[NodeId]) {
        for (i, stmt) in statements.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.statement(*stmt);
        }
    }

    fn block(&mut self, id: NodeId) {
        let tree = self.tree;
        let body = tree.list(id, "body");
        self.token("{");
        if !body.is_empty() {
            self.out.add_indent();
            self.newline();
            self.statement_list(body);
            self.out.remove_indent();
            self.newline();
        }
        self.token("}");
    }

    /// Body of a loop, `if`, `with` or label.
    fn body(&mut self, id: NodeId) {
        if self.tree.is(id, Kind::BlockStatement) {
            self.space();
            self.block(id);
        } else if self.tree.is(id, Kind::EmptyStatement) {
            self.token(";");
        } else {
            self.space();
            self.statement(id);
        }
    }

    fn ends_with_open_if(&self, id: NodeId) -> bool {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::IfStatement => match tree.child(id, "alternate") {
                None => true,
                Some(alternate) => self.ends_with_open_if(alternate),
            },
            Kind::ForStatement
            | Kind::ForInStatement
            | Kind::ForOfStatement
            | Kind::WhileStatement
            | Kind::WithStatement
            | Kind::LabeledStatement => tree
                .child(id, "body")
                .is_some_and(|body| self.ends_with_open_if(body)),
            _ => false,
        }
    }

    fn comments(&mut self, id: NodeId) {
        let tree = self.tree;
        if self.out.is_compact() {
            return;
        }
        for comment in &tree.node(id).comments {
            self.token(&format!("/* {} */", comment.replace("*/", "* /")));
            self.newline();
        }
    }

    fn statement(&mut self, id: NodeId) {
        let tree = self.tree;
        self.comments(id);
        match tree.kind(id) {
            Kind::ExpressionStatement => {
                let Some(expr) = tree.child(id, "expression") else {
                    self.token(";");
                    return;
                };
                let stray_string = tree.get(id, "directive").is_none()
                    && tree.string_value(expr).is_some();
                if stray_string || self.starts_ambiguously(expr) || self.starts_with_let(expr) {
                    self.token("(");
                    self.expression(expr, 0);
                    self.token(")");
                } else {
                    self.expression(expr, 0);
                }
                self.token(";");
            }
            Kind::BlockStatement | Kind::StaticBlock => self.block(id),
            Kind::EmptyStatement => self.token(";"),
            Kind::DebuggerStatement => {
                self.token("debugger");
                self.token(";");
            }
            Kind::WithStatement => {
                self.token("with");
                self.space();
                self.token("(");
                self.child_expression(id, "object", 0);
                self.token(")");
                self.child_body(id);
            }
            Kind::ReturnStatement | Kind::ThrowStatement => {
                self.token(if tree.is(id, Kind::ReturnStatement) {
                    "return"
                } else {
                    "throw"
                });
                if let Some(argument) = tree.child(id, "argument") {
                    self.space();
                    self.expression(argument, 0);
                }
                self.token(";");
            }
            Kind::LabeledStatement => {
                self.child_expression(id, "label", 0);
                self.token(":");
                if let Some(body) = tree.child(id, "body") {
                    self.body(body);
                }
            }
            Kind::BreakStatement | Kind::ContinueStatement => {
                self.token(if tree.is(id, Kind::BreakStatement) {
                    "break"
                } else {
                    "continue"
                });
                if let Some(label) = tree.child(id, "label") {
                    self.space();
                    self.expression(label, 0);
                }
                self.token(";");
            }
            Kind::IfStatement => self.if_statement(id),
            Kind::SwitchStatement => self.switch_statement(id),
            Kind::TryStatement => {
                self.token("try");
                self.space();
                if let Some(block) = tree.child(id, "block") {
                    self.block(block);
                }
                if let Some(handler) = tree.child(id, "handler") {
                    self.space();
                    self.token("catch");
                    if let Some(param) = tree.child(handler, "param") {
                        self.space();
                        self.token("(");
                        self.expression(param, 0);
                        self.token(")");
                    }
                    self.space();
                    if let Some(body) = tree.child(handler, "body") {
                        self.block(body);
                    }
                }
                if let Some(finalizer) = tree.child(id, "finalizer") {
                    self.space();
                    self.token("finally");
                    self.space();
                    self.block(finalizer);
                }
            }
            Kind::WhileStatement => {
                self.token("while");
                self.space();
                self.token("(");
                self.child_expression(id, "test", 0);
                self.token(")");
                self.child_body(id);
            }
            Kind::DoWhileStatement => {
                self.token("do");
                if let Some(body) = tree.child(id, "body") {
                    if tree.is(body, Kind::BlockStatement) {
                        self.space();
                        self.block(body);
                        self.space();
                    } else {
                        self.space();
                        self.statement(body);
                        self.space();
                    }
                }
                self.token("while");
                self.space();
                self.token("(");
                self.child_expression(id, "test", 0);
                self.token(")");
                self.token(";");
            }
            Kind::ForStatement => self.for_statement(id),
            Kind::ForInStatement | Kind::ForOfStatement => {
                let of = tree.is(id, Kind::ForOfStatement);
                self.token("for");
                if of && tree.flag(id, "await") {
                    self.token("await");
                }
                self.space();
                self.token("(");
                if let Some(left) = tree.child(id, "left") {
                    if tree.is(left, Kind::VariableDeclaration) {
                        self.variable_declaration(left, false);
                    } else {
                        self.expression(left, CALL);
                    }
                }
                self.token(if of { "of" } else { "in" });
                self.space();
                self.child_expression(id, "right", if of { 1 } else { 0 });
                self.token(")");
                self.child_body(id);
            }
            Kind::FunctionDeclaration | Kind::FunctionExpression => self.function(id),
            Kind::VariableDeclaration => {
                self.variable_declaration(id, false);
                self.token(";");
            }
            Kind::ClassDeclaration | Kind::ClassExpression => self.class(id),
            Kind::ImportDeclaration => self.import_declaration(id),
            Kind::ExportNamedDeclaration => self.export_named(id),
            Kind::ExportDefaultDeclaration => {
                self.token("export");
                self.token("default");
                self.space();
                if let Some(declaration) = tree.child(id, "declaration") {
                    match tree.kind(declaration) {
                        Kind::FunctionDeclaration | Kind::ClassDeclaration => {
                            self.statement(declaration);
                        }
                        _ => {
                            if self.starts_ambiguously(declaration) {
                                self.token("(");
                                self.expression(declaration, 1);
                                self.token(")");
                            } else {
                                self.expression(declaration, 1);
                            }
                            self.token(";");
                        }
                    }
                }
            }
            Kind::ExportAllDeclaration => {
                self.token("export");
                self.space();
                self.token("*");
                if let Some(exported) = tree.child(id, "exported") {
                    self.space();
                    self.token("as");
                    self.space();
                    self.module_name(exported);
                }
                self.space();
                self.token("from");
                self.space();
                self.child_expression(id, "source", 0);
                self.token(";");
            }
            _ => {
                self.expression(id, 0);
                self.token(";");
            }
        }
    }

    fn starts_with_let(&self, expr: NodeId) -> bool {
        let tree = self.tree;
        let mut current = expr;
        loop {
            match tree.kind(current) {
                Kind::MemberExpression if tree.flag(current, "computed") => {
                    match tree.child(current, "object") {
                        Some(object) => current = object,
                        None => return false,
                    }
                }
                Kind::Identifier => return tree.name(current) == Some("let"),
                _ => return false,
            }
        }
    }

    fn child_expression(&mut self, id: NodeId, key: &str, min: u8) {
        if let Some(child) = self.tree.child(id, key) {
            self.expression(child, min);
        }
    }

    fn child_body(&mut self, id: NodeId) {
        if let Some(body) = self.tree.child(id, "body") {
            self.body(body);
        }
    }

    fn if_statement(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("if");
        self.space();
        self.token("(");
        self.child_expression(id, "test", 0);
        self.token(")");
        let Some(consequent) = tree.child(id, "consequent") else {
            return;
        };
        let alternate = tree.child(id, "alternate");
        if alternate.is_some() && self.ends_with_open_if(consequent) {
            self.space();
            self.token("{");
            self.out.add_indent();
            self.newline();
            self.statement(consequent);
            self.out.remove_indent();
            self.newline();
            self.token("}");
        } else {
            self.body(consequent);
        }
        if let Some(alternate) = alternate {
            self.space();
            self.token("else");
            if tree.is(alternate, Kind::IfStatement) {
                self.space();
                self.statement(alternate);
            } else {
                self.body(alternate);
            }
        }
    }

    fn switch_statement(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("switch");
        self.space();
        self.token("(");
        self.child_expression(id, "discriminant", 0);
        self.token(")");
        self.space();
        self.token("{");
        self.out.add_indent();
        for case in tree.list(id, "cases") {
            self.newline();
            match tree.child(*case, "test") {
                Some(test) => {
                    self.token("case");
                    self.space();
                    self.expression(test, 0);
                }
                None => self.token("default"),
            }
            self.token(":");
            let consequent = tree.list(*case, "consequent");
            if !consequent.is_empty() {
                self.out.add_indent();
                self.newline();
                self.statement_list(consequent);
                self.out.remove_indent();
            }
        }
        self.out.remove_indent();
        self.newline();
        self.token("}");
    }

    fn for_statement(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("for");
        self.space();
        self.token("(");
        if let Some(init) = tree.child(id, "init") {
            if tree.is(init, Kind::VariableDeclaration) {
                self.variable_declaration(init, true);
            } else if self.contains_in(init) || self.starts_with_let(init) {
                self.token("(");
                self.expression(init, 0);
                self.token(")");
            } else {
                self.expression(init, 0);
            }
        }
        self.token(";");
        if let Some(test) = tree.child(id, "test") {
            self.space();
            self.expression(test, 0);
        }
        self.token(";");
        if let Some(update) = tree.child(id, "update") {
            self.space();
            self.expression(update, 0);
        }
        self.token(")");
        self.child_body(id);
    }

    fn variable_declaration(&mut self, id: NodeId, no_in: bool) {
        let tree = self.tree;
        self.token(tree.str(id, "kind").unwrap_or("var"));
        self.space();
        for (i, declarator) in tree.list(id, "declarations").iter().enumerate() {
            if i > 0 {
                self.comma();
            }
            self.child_expression(*declarator, "id", 1);
            if let Some(init) = tree.child(*declarator, "init") {
                self.space();
                self.token("=");
                self.space();
                if no_in && self.contains_in(init) {
                    self.token("(");
                    self.expression(init, 0);
                    self.token(")");
                } else {
                    self.expression(init, 1);
                }
            }
        }
    }

    fn params(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("(");
        for (i, param) in tree.list(id, "params").iter().enumerate() {
            if i > 0 {
                self.comma();
            }
            self.expression(*param, 1);
        }
        self.token(")");
    }

    fn function_head(&mut self, id: NodeId) {
        let tree = self.tree;
        if tree.flag(id, "async") {
            self.token("async");
        }
        self.token("function");
        if tree.flag(id, "generator") {
            self.token("*");
        }
        if let Some(name) = tree.child(id, "id") {
            self.space();
            self.expression(name, 0);
        }
    }

    fn function(&mut self, id: NodeId) {
        self.function_head(id);
        self.function_rest(id);
    }

    /// Parameters and body of a function, shared with methods.
    fn function_rest(&mut self, id: NodeId) {
        let tree = self.tree;
        self.params(id);
        self.space();
        if let Some(body) = tree.child(id, "body") {
            self.block(body);
        }
    }

    fn arrow(&mut self, id: NodeId) {
        let tree = self.tree;
        if tree.flag(id, "async") {
            self.token("async");
            self.space();
        }
        self.params(id);
        self.space();
        self.token("=>");
        self.space();
        let Some(body) = tree.child(id, "body") else {
            return;
        };
        if tree.is(body, Kind::BlockStatement) {
            self.block(body);
        } else if self.starts_ambiguously(body) {
            self.token("(");
            self.expression(body, 1);
            self.token(")");
        } else {
            self.expression(body, 1);
        }
    }

    fn class(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("class");
        if let Some(name) = tree.child(id, "id") {
            self.space();
            self.expression(name, 0);
        }
        if let Some(super_class) = tree.child(id, "superClass") {
            self.space();
            self.token("extends");
            self.space();
            self.expression(super_class, CALL);
        }
        self.space();
        self.token("{");
        let members = tree
            .child(id, "body")
            .map(|body| tree.list(body, "body"))
            .unwrap_or(&[]);
        if !members.is_empty() {
            self.out.add_indent();
            for member in members {
                self.newline();
                self.class_member(*member);
            }
            self.out.remove_indent();
            self.newline();
        }
        self.token("}");
    }

    fn class_member(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::StaticBlock => {
                self.token("static");
                self.space();
                self.block(id);
            }
            Kind::MethodDefinition => {
                if tree.flag(id, "static") {
                    self.token("static");
                    self.space();
                }
                self.method(id);
            }
            Kind::PropertyDefinition => {
                if tree.flag(id, "static") {
                    self.token("static");
                    self.space();
                }
                self.property_key(id);
                if let Some(value) = tree.child(id, "value") {
                    self.space();
                    self.token("=");
                    self.space();
                    self.expression(value, 1);
                }
                self.token(";");
            }
            _ => {}
        }
    }

    /// Method shorthand shared by classes and object literals.
    fn method(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(value) = tree.child(id, "value") else {
            return;
        };
        match tree.str(id, "kind") {
            Some("get") => {
                self.token("get");
                self.space();
            }
            Some("set") => {
                self.token("set");
                self.space();
            }
            _ => {
                if tree.flag(value, "async") {
                    self.token("async");
                    self.space();
                }
                if tree.flag(value, "generator") {
                    self.token("*");
                }
            }
        }
        self.property_key(id);
        self.function_rest(value);
    }

    fn property_key(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(key) = tree.child(id, "key") else {
            return;
        };
        if tree.flag(id, "computed") {
            self.token("[");
            self.expression(key, 1);
            self.token("]");
        } else {
            self.expression(key, PRIMARY);
        }
    }

    fn property(&mut self, id: NodeId) {
        let tree = self.tree;
        if !tree.is(id, Kind::Property) {
            self.expression(id, 1);
            return;
        }
        let kind = tree.str(id, "kind").unwrap_or("init");
        if kind != "init" || tree.flag(id, "method") {
            self.method(id);
            return;
        }
        let (Some(key), Some(value)) = (tree.child(id, "key"), tree.child(id, "value")) else {
            return;
        };
        if tree.flag(id, "shorthand") && !tree.flag(id, "computed") {
            let key_name = tree.name(key);
            let value_name = if tree.is(value, Kind::AssignmentPattern) {
                tree.child(value, "left").and_then(|left| tree.name(left))
            } else {
                tree.name(value)
            };
            if key_name.is_some() && key_name == value_name {
                self.expression(value, 1);
                return;
            }
        }
        self.property_key(id);
        self.token(":");
        self.space();
        self.expression(value, 1);
    }

    fn arguments(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("(");
        for (i, argument) in tree.list(id, "arguments").iter().enumerate() {
            if i > 0 {
                self.comma();
            }
            self.expression(*argument, 1);
        }
        self.token(")");
    }

    fn module_name(&mut self, id: NodeId) {
        self.expression(id, PRIMARY);
    }

    fn import_declaration(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("import");
        let specifiers = tree.list(id, "specifiers");
        if !specifiers.is_empty() {
            self.space();
            let mut named = Vec::new();
            let mut first = true;
            for spec in specifiers {
                match tree.kind(*spec) {
                    Kind::ImportDefaultSpecifier => {
                        if !first {
                            self.comma();
                        }
                        self.child_expression(*spec, "local", 0);
                        first = false;
                    }
                    Kind::ImportNamespaceSpecifier => {
                        if !first {
                            self.comma();
                        }
                        self.token("*");
                        self.space();
                        self.token("as");
                        self.space();
                        self.child_expression(*spec, "local", 0);
                        first = false;
                    }
                    _ => named.push(*spec),
                }
            }
            if !named.is_empty() {
                if !first {
                    self.comma();
                }
                self.token("{");
                for (i, spec) in named.iter().enumerate() {
                    if i > 0 {
                        self.comma();
                    }
                    self.aliased(*spec, "imported", "local");
                }
                self.token("}");
            }
            self.space();
            self.token("from");
        }
        self.space();
        self.child_expression(id, "source", 0);
        self.token(";");
    }

    /// `a` or `a as b` for import and export specifiers.
    fn aliased(&mut self, id: NodeId, outer: &str, inner: &str) {
        let tree = self.tree;
        let (Some(first), Some(second)) = (tree.child(id, outer), tree.child(id, inner)) else {
            return;
        };
        let (first, second) = if outer == "imported" {
            (first, second)
        } else {
            (second, first)
        };
        self.module_name(first);
        if !tree.structurally_equal(first, second) {
            self.space();
            self.token("as");
            self.space();
            self.module_name(second);
        }
    }

    fn export_named(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("export");
        self.space();
        if let Some(declaration) = tree.child(id, "declaration") {
            self.statement(declaration);
            return;
        }
        self.token("{");
        for (i, spec) in tree.list(id, "specifiers").iter().enumerate() {
            if i > 0 {
                self.comma();
            }
            self.aliased(*spec, "exported", "local");
        }
        self.token("}");
        if let Some(source) = tree.child(id, "source") {
            self.space();
            self.token("from");
            self.space();
            self.expression(source, 0);
        }
        self.token(";");
    }

    fn literal(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.get(id, "value") {
            Some(Value::Str(s)) => {
                let quoted = quote(s);
                self.token(&quoted);
            }
            Some(Value::Num(n)) => self.number(*n),
            Some(Value::Bool(b)) => self.token(if *b { "true" } else { "false" }),
            _ => self.token("null"),
        }
    }

    fn number(&mut self, n: f64) {
        if n.is_nan() {
            self.token("0/0");
        } else if n.is_infinite() {
            self.token(if n > 0.0 { "1/0" } else { "-1/0" });
        } else if n.is_sign_negative() {
            self.token("-");
            self.token(&format!("{}", -n));
        } else {
            self.token(&format!("{n}"));
        }
    }

    fn template(&mut self, id: NodeId) {
        let tree = self.tree;
        self.token("`");
        let expressions = tree.list(id, "expressions");
        for (i, quasi) in tree.list(id, "quasis").iter().enumerate() {
            if let Some(raw) = tree.str(*quasi, "raw") {
                self.raw(raw);
            }
            if let Some(expr) = expressions.get(i) {
                self.raw("${");
                self.expression(*expr, 0);
                self.raw("}");
            }
        }
        self.raw("`");
    }

    fn raw(&mut self, text: &str) {
        self.out.add_raw(text);
    }

    fn expression(&mut self, id: NodeId, min: u8) {
        let own = self.precedence(id);
        if own < min {
            self.token("(");
            self.expression_inner(id);
            self.token(")");
        } else {
            self.expression_inner(id);
        }
    }

    fn callee(&mut self, callee: NodeId, new_expression: bool) {
        let tree = self.tree;
        let needs_parens = tree.is(callee, Kind::ChainExpression)
            || (new_expression && self.has_call_in_chain(callee));
        if needs_parens {
            self.token("(");
            self.expression(callee, 0);
            self.token(")");
        } else {
            self.expression(callee, CALL);
        }
    }

    fn has_call_in_chain(&self, id: NodeId) -> bool {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::CallExpression => true,
            Kind::MemberExpression => tree
                .child(id, "object")
                .is_some_and(|object| self.has_call_in_chain(object)),
            Kind::TaggedTemplateExpression => tree
                .child(id, "tag")
                .is_some_and(|tag| self.has_call_in_chain(tag)),
            _ => false,
        }
    }

    fn expression_inner(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            Kind::Identifier => {
                if let Some(name) = tree.name(id) {
                    self.token(name);
                }
            }
            Kind::PrivateIdentifier => {
                if let Some(name) = tree.name(id) {
                    self.token(&format!("#{name}"));
                }
            }
            Kind::Literal => self.literal(id),
            Kind::RegExpLiteral => self.token(tree.str(id, "raw").unwrap_or("/(?:)/")),
            Kind::BigIntLiteral => self.token(tree.str(id, "raw").unwrap_or("0n")),
            Kind::TemplateLiteral => self.template(id),
            Kind::TaggedTemplateExpression => {
                if let Some(tag) = tree.child(id, "tag") {
                    self.callee(tag, false);
                }
                if let Some(quasi) = tree.child(id, "quasi") {
                    self.template(quasi);
                }
            }
            Kind::ThisExpression => self.token("this"),
            Kind::Super => self.token("super"),
            Kind::ArrayExpression | Kind::ArrayPattern => {
                let elements = tree.list(id, "elements");
                self.token("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.comma();
                    }
                    if !tree.is(*element, Kind::Elision) {
                        self.expression(*element, 1);
                    }
                }
                if elements.last().is_some_and(|last| tree.is(*last, Kind::Elision)) {
                    self.token(",");
                }
                self.token("]");
            }
            Kind::Elision => {}
            Kind::ObjectExpression | Kind::ObjectPattern => {
                let properties = tree.list(id, "properties");
                self.token("{");
                if !properties.is_empty() {
                    self.space();
                    for (i, property) in properties.iter().enumerate() {
                        if i > 0 {
                            self.comma();
                        }
                        self.property(*property);
                    }
                    self.space();
                }
                self.token("}");
            }
            Kind::Property => self.property(id),
            Kind::FunctionExpression | Kind::FunctionDeclaration => self.function(id),
            Kind::ArrowFunctionExpression => self.arrow(id),
            Kind::ClassExpression | Kind::ClassDeclaration => self.class(id),
            Kind::UnaryExpression => {
                let operator = tree.str(id, "operator").unwrap_or("!");
                self.token(operator);
                self.child_expression(id, "argument", UNARY);
            }
            Kind::AwaitExpression => {
                self.token("await");
                self.space();
                self.child_expression(id, "argument", UNARY);
            }
            Kind::UpdateExpression => {
                let operator = tree.str(id, "operator").unwrap_or("++");
                if tree.flag(id, "prefix") {
                    self.token(operator);
                    self.child_expression(id, "argument", POSTFIX + 1);
                } else {
                    self.child_expression(id, "argument", POSTFIX + 1);
                    self.token(operator);
                }
            }
            Kind::BinaryExpression | Kind::LogicalExpression => self.binary(id),
            Kind::AssignmentExpression => {
                self.child_expression(id, "left", CALL);
                self.space();
                self.token(tree.str(id, "operator").unwrap_or("="));
                self.space();
                self.child_expression(id, "right", 1);
            }
            Kind::AssignmentPattern => {
                self.child_expression(id, "left", CALL);
                self.space();
                self.token("=");
                self.space();
                self.child_expression(id, "right", 1);
            }
            Kind::ConditionalExpression => {
                self.child_expression(id, "test", 3);
                self.space();
                self.token("?");
                self.space();
                self.child_expression(id, "consequent", 1);
                self.space();
                self.token(":");
                self.space();
                self.child_expression(id, "alternate", 1);
            }
            Kind::CallExpression => {
                if let Some(callee) = tree.child(id, "callee") {
                    self.callee(callee, false);
                }
                if tree.flag(id, "optional") {
                    self.token("?.");
                }
                self.arguments(id);
            }
            Kind::NewExpression => {
                self.token("new");
                if let Some(callee) = tree.child(id, "callee") {
                    self.callee(callee, true);
                }
                self.arguments(id);
            }
            Kind::MemberExpression => {
                if let Some(object) = tree.child(id, "object") {
                    let numeric = tree.number_value(object).is_some();
                    if numeric || tree.is(object, Kind::ChainExpression) {
                        self.token("(");
                        self.expression(object, 0);
                        self.token(")");
                    } else {
                        self.callee(object, false);
                    }
                }
                let optional = tree.flag(id, "optional");
                if tree.flag(id, "computed") {
                    if optional {
                        self.token("?.");
                    }
                    self.token("[");
                    self.child_expression(id, "property", 0);
                    self.token("]");
                } else {
                    self.token(if optional { "?." } else { "." });
                    self.child_expression(id, "property", PRIMARY);
                }
            }
            Kind::ChainExpression => self.child_expression(id, "expression", 0),
            Kind::SequenceExpression => {
                for (i, expr) in tree.list(id, "expressions").iter().enumerate() {
                    if i > 0 {
                        self.comma();
                    }
                    self.expression(*expr, 1);
                }
            }
            Kind::YieldExpression => {
                self.token("yield");
                if tree.flag(id, "delegate") {
                    self.token("*");
                }
                if let Some(argument) = tree.child(id, "argument") {
                    self.space();
                    self.expression(argument, 1);
                }
            }
            Kind::MetaProperty => {
                self.child_expression(id, "meta", PRIMARY);
                self.token(".");
                self.child_expression(id, "property", PRIMARY);
            }
            Kind::ImportExpression => {
                self.token("import");
                self.token("(");
                self.child_expression(id, "source", 1);
                self.token(")");
            }
            Kind::SpreadElement | Kind::RestElement => {
                self.token("...");
                self.child_expression(id, "argument", 1);
            }
            Kind::TemplateElement | Kind::Detached => {}
            _ => self.statement(id),
        }
    }

    fn binary(&mut self, id: NodeId) {
        let tree = self.tree;
        let operator = tree.str(id, "operator").unwrap_or("+");
        let own = binary_precedence(operator);
        let (left_min, right_min) = if operator == "**" {
            (POSTFIX, own)
        } else {
            (own, own + 1)
        };
        let mixes_nullish = |child: NodeId| {
            tree.is(child, Kind::LogicalExpression)
                && match tree.str(child, "operator") {
                    Some("??") => operator != "??",
                    Some(_) => operator == "??",
                    None => false,
                }
        };
        for (key, min) in [("left", left_min), ("right", right_min)] {
            if key == "right" {
                self.space();
                self.token(operator);
                self.space();
            }
            let Some(child) = tree.child(id, key) else {
                continue;
            };
            if mixes_nullish(child) {
                self.token("(");
                self.expression(child, 0);
                self.token(")");
            } else {
                self.expression(child, min);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn roundtrip(code: &str) -> String {
        let tree = parse(code, false).unwrap();
        Codegen::new().with_compact(true).build(&tree, tree.root())
    }

    #[test]
    fn test_precedence_parentheses() {
        assert_eq!(roundtrip("(a + b) * c;"), "(a+b)*c;");
        assert_eq!(roundtrip("a + b * c;"), "a+b*c;");
        assert_eq!(roundtrip("a - (b - c);"), "a-(b-c);");
        assert_eq!(roundtrip("(-a) ** b;"), "(-a)**b;");
        assert_eq!(roundtrip("a ?? (b || c);"), "a??(b||c);");
    }

    #[test]
    fn test_statement_start_ambiguity() {
        assert_eq!(roundtrip("({}).x;"), "({}.x);");
        assert_eq!(roundtrip("(function(){})();"), "(function(){}());");
        assert_eq!(roundtrip("f(() => ({a: 1}));"), "f(()=>({a:1}));");
    }

    #[test]
    fn test_token_separation() {
        assert_eq!(roundtrip("a + +b;"), "a+ +b;");
        assert_eq!(roundtrip("typeof x;"), "typeof x;");
        assert_eq!(roundtrip("void 0;"), "void 0;");
        assert_eq!(roundtrip("1..toString();"), "(1).toString();");
    }

    #[test]
    fn test_dangling_else_is_braced() {
        let mut tree = parse("if (a) { if (b) c(); } else d();", false).unwrap();
        let root = tree.root();
        let stmt = tree.list(root, "body")[0];
        let block = tree.child(stmt, "consequent").unwrap();
        let inner = tree.list(block, "body")[0];
        tree.set(stmt, "consequent", inner);
        let code = Codegen::new().with_compact(true).build(&tree, root);
        assert_eq!(code, "if(a){if(b)c();}else d();");
    }

    #[test]
    fn test_strings_are_escaped() {
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(roundtrip("x; 'it\\'s';"), "x;(\"it's\");");
    }

    #[test]
    fn test_pretty_output() {
        let tree = parse("function f(a){if(a){return 1}return 2}", false).unwrap();
        let code = Codegen::new().build(&tree, tree.root());
        assert_eq!(
            code,
            "function f(a) {\n  if (a) {\n    return 1;\n  }\n  return 2;\n}"
        );
    }

    #[test]
    fn test_for_in_initializer() {
        assert_eq!(
            roundtrip("for (var i = ('a' in b); i;) {}"),
            "for(var i=(\"a\"in b);i;){}"
        );
    }
}
