//! Read-only questions about the tree: lexical contexts, reserved words and
//! the syntactic role of identifiers.

mod identifier;

pub use identifier::{IdentifierInfo, IdentifierUsage, classify, get_defining_identifier};

use lazy_static::lazy_static;
use regex::Regex;

use crate::traverse::scan;
use crate::tree::{Kind, NodeId, Tree};

pub const RESERVED_KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Names that are not keywords but must never be declared by generated code.
pub const RESERVED_IDENTIFIERS: &[&str] = &["undefined", "NaN", "Infinity", "eval", "arguments"];

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name) || RESERVED_IDENTIFIERS.contains(&name)
}

/// Whether `name` can be written as a bare ASCII identifier or dot-access
/// property name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name) && !RESERVED_KEYWORDS.contains(&name)
}

pub fn is_block(tree: &Tree, node: NodeId) -> bool {
    tree.kind(node).is_block()
}

pub fn is_function(tree: &Tree, node: NodeId) -> bool {
    tree.kind(node).is_function()
}

pub fn is_loop(tree: &Tree, node: NodeId) -> bool {
    tree.kind(node).is_loop()
}

/// Functions and the program are the units of hoisting and `var` scope.
pub fn is_context(tree: &Tree, node: NodeId) -> bool {
    let kind = tree.kind(node);
    kind.is_function() || kind == Kind::Program
}

/// The closest function or program enclosing `node`.
pub fn get_var_context(tree: &Tree, node: NodeId, parents: &[NodeId]) -> NodeId {
    parents
        .iter()
        .copied()
        .find(|p| is_context(tree, *p))
        .or_else(|| parents.last().copied())
        .unwrap_or(node)
}

/// Number of blocks enclosing a node.
pub fn get_depth(tree: &Tree, parents: &[NodeId]) -> usize {
    parents.iter().filter(|p| is_block(tree, **p)).count()
}

/// Whether the body of `function` uses `this`, `arguments`, `super` or
/// `new.target` of its own, looking through nested arrows but not through
/// nested functions.
pub fn references_this_or_arguments(tree: &Tree, function: NodeId) -> bool {
    let mut found = false;
    scan(tree, function, &[], |node, parents| {
        if found {
            return false;
        }
        match tree.kind(node) {
            Kind::ThisExpression | Kind::Super | Kind::MetaProperty => {
                found = true;
                false
            }
            Kind::Identifier if tree.name(node) == Some("arguments") => {
                if classify(tree, node, parents).is_variable() {
                    found = true;
                }
                false
            }
            Kind::FunctionDeclaration | Kind::FunctionExpression => node == function,
            Kind::ClassBody => false,
            _ => true,
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn first_function(tree: &Tree) -> NodeId {
        let mut found = None;
        scan(tree, tree.root(), &[], |node, _| {
            if found.is_none() && tree.kind(node).is_function() {
                found = Some(node);
            }
            found.is_none()
        });
        found.unwrap()
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("foo"));
        assert!(is_valid_identifier("$_a1"));
        assert!(!is_valid_identifier("1a"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("class"));
        assert!(!is_valid_identifier(""));
        assert!(is_reserved("arguments"));
    }

    #[test]
    fn test_this_and_arguments_detection() {
        let cases = [
            ("function f() { return this.x; }", true),
            ("function f() { return arguments[0]; }", true),
            ("function f() { return () => this; }", true),
            ("function f() { return function () { return this; }; }", false),
            ("function f(a) { return a.arguments; }", false),
            ("function f() { return { arguments: 1 }; }", false),
            ("function f() { return 1; }", false),
        ];
        for (code, expected) in cases {
            let tree = parse(code, false).unwrap();
            let func = first_function(&tree);
            assert_eq!(references_this_or_arguments(&tree, func), expected, "{}", code);
        }
    }

    #[test]
    fn test_contexts_and_depth() {
        let tree = parse("function f() { { x; } }", false).unwrap();
        let mut seen = None;
        scan(&tree, tree.root(), &[], |node, parents| {
            if tree.name(node) == Some("x") {
                seen = Some((get_var_context(&tree, node, parents), get_depth(&tree, parents)));
            }
            true
        });
        let (context, depth) = seen.unwrap();
        assert_eq!(tree.kind(context), Kind::FunctionDeclaration);
        // program, function body, inner block
        assert_eq!(depth, 3);
    }
}
