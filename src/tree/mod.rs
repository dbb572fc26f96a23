//! Arena-backed, ESTree-shaped syntax tree.
//!
//! Nodes are addressed by [`NodeId`] handles and mutated in place. A handle
//! keeps its identity for the whole run: replacing a node overwrites its kind
//! and fields but never reallocates it, so every holder of the id observes the
//! new shape.

mod build;
mod ops;

pub use ops::{append, insert_after, insert_before, prepend};

use std::fmt;

/// Field keys starting with this marker are pass-local annotations. They are
/// ignored by traversal, structural comparison and code generation.
pub const PRIVATE_PREFIX: char = '$';

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! kinds {
    ($($name:ident),* $(,)?) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Kind {
            $($name),*
        }

        impl Kind {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name)),*
                }
            }
        }
    };
}

kinds! {
    Program,
    Identifier,
    PrivateIdentifier,
    Literal,
    RegExpLiteral,
    BigIntLiteral,
    TemplateLiteral,
    TemplateElement,
    TaggedTemplateExpression,
    ThisExpression,
    Super,
    ArrayExpression,
    Elision,
    ObjectExpression,
    Property,
    FunctionExpression,
    ArrowFunctionExpression,
    ClassExpression,
    UnaryExpression,
    UpdateExpression,
    BinaryExpression,
    LogicalExpression,
    AssignmentExpression,
    ConditionalExpression,
    CallExpression,
    NewExpression,
    MemberExpression,
    ChainExpression,
    SequenceExpression,
    YieldExpression,
    AwaitExpression,
    MetaProperty,
    ImportExpression,
    SpreadElement,
    RestElement,
    ObjectPattern,
    ArrayPattern,
    AssignmentPattern,
    ExpressionStatement,
    BlockStatement,
    StaticBlock,
    EmptyStatement,
    DebuggerStatement,
    WithStatement,
    ReturnStatement,
    LabeledStatement,
    BreakStatement,
    ContinueStatement,
    IfStatement,
    SwitchStatement,
    SwitchCase,
    ThrowStatement,
    TryStatement,
    CatchClause,
    WhileStatement,
    DoWhileStatement,
    ForStatement,
    ForInStatement,
    ForOfStatement,
    FunctionDeclaration,
    VariableDeclaration,
    VariableDeclarator,
    ClassDeclaration,
    ClassBody,
    MethodDefinition,
    PropertyDefinition,
    ImportDeclaration,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    ExportNamedDeclaration,
    ExportSpecifier,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    Detached,
}

impl Kind {
    pub const fn is_function(self) -> bool {
        matches!(
            self,
            Self::FunctionDeclaration | Self::FunctionExpression | Self::ArrowFunctionExpression
        )
    }

    pub const fn is_loop(self) -> bool {
        matches!(
            self,
            Self::ForStatement
                | Self::ForInStatement
                | Self::ForOfStatement
                | Self::WhileStatement
                | Self::DoWhileStatement
        )
    }

    /// Nodes exposing a `body` statement list.
    pub const fn is_block(self) -> bool {
        matches!(self, Self::Program | Self::BlockStatement | Self::StaticBlock)
    }

    pub const fn is_class(self) -> bool {
        matches!(self, Self::ClassDeclaration | Self::ClassExpression)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Node(NodeId),
    List(Vec<NodeId>),
}

impl Value {
    pub const fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NodeId]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<NodeId> for Value {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

impl From<Option<NodeId>> for Value {
    fn from(value: Option<NodeId>) -> Self {
        value.map_or(Self::Null, Self::Node)
    }
}

impl From<Vec<NodeId>> for Value {
    fn from(value: Vec<NodeId>) -> Self {
        Self::List(value)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: Kind,
    pub fields: Vec<(&'static str, Value)>,
    pub comments: Vec<String>,
}

impl Node {
    pub const fn new(kind: Kind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            comments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((key, value.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Creates a tree holding an empty `Program`.
    pub fn new(module: bool) -> Self {
        let program = Node::new(Kind::Program)
            .with("sourceType", if module { "module" } else { "script" })
            .with("body", Vec::new());
        Self {
            nodes: vec![program],
            root: NodeId(0),
        }
    }

    pub const fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_module(&self) -> bool {
        self.str(self.root, "sourceType") == Some("module")
    }

    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> Kind {
        self.nodes[id.index()].kind
    }

    pub fn is(&self, id: NodeId, kind: Kind) -> bool {
        self.kind(id) == kind
    }

    pub fn get(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.nodes[id.index()]
            .fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.get(id, key).and_then(Value::as_node)
    }

    /// The node list stored under `key`, empty when absent.
    pub fn list(&self, id: NodeId, key: &str) -> &[NodeId] {
        self.get(id, key).and_then(Value::as_list).unwrap_or(&[])
    }

    pub fn list_mut(&mut self, id: NodeId, key: &str) -> Option<&mut Vec<NodeId>> {
        self.nodes[id.index()]
            .fields
            .iter_mut()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| match v {
                Value::List(items) => Some(items),
                _ => None,
            })
    }

    pub fn str(&self, id: NodeId, key: &str) -> Option<&str> {
        self.get(id, key).and_then(Value::as_str)
    }

    /// Boolean flag under `key`; absent flags read as false.
    pub fn flag(&self, id: NodeId, key: &str) -> bool {
        matches!(self.get(id, key), Some(Value::Bool(true)))
    }

    pub fn set(&mut self, id: NodeId, key: &'static str, value: impl Into<Value>) {
        let value = value.into();
        let fields = &mut self.nodes[id.index()].fields;
        if let Some(slot) = fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            fields.push((key, value));
        }
    }

    pub fn remove_field(&mut self, id: NodeId, key: &str) -> Option<Value> {
        let fields = &mut self.nodes[id.index()].fields;
        let pos = fields.iter().position(|(k, _)| *k == key)?;
        Some(fields.remove(pos).1)
    }

    /// Name of an `Identifier` (or `PrivateIdentifier`) node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Kind::Identifier | Kind::PrivateIdentifier => self.str(id, "name"),
            _ => None,
        }
    }

    pub fn is_identifier(&self, id: NodeId, name: &str) -> bool {
        self.is(id, Kind::Identifier) && self.name(id) == Some(name)
    }

    /// Value of a string `Literal`.
    pub fn string_value(&self, id: NodeId) -> Option<&str> {
        if self.is(id, Kind::Literal) {
            self.str(id, "value")
        } else {
            None
        }
    }

    pub fn number_value(&self, id: NodeId) -> Option<f64> {
        match (self.kind(id), self.get(id, "value")) {
            (Kind::Literal, Some(Value::Num(n))) => Some(*n),
            _ => None,
        }
    }

    /// Children reachable through public fields, in field order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (key, value) in &self.nodes[id.index()].fields {
            if key.starts_with(PRIVATE_PREFIX) {
                continue;
            }
            match value {
                Value::Node(child) => out.push(*child),
                Value::List(items) => out.extend_from_slice(items),
                _ => {}
            }
        }
        out
    }

    pub fn contains_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.nodes[parent.index()]
            .fields
            .iter()
            .filter(|(key, _)| !key.starts_with(PRIVATE_PREFIX))
            .any(|(_, value)| match value {
                Value::Node(id) => *id == child,
                Value::List(items) => items.contains(&child),
                _ => false,
            })
    }

    /// Key of the field in `parent` that holds `child`.
    pub fn field_of(&self, parent: NodeId, child: NodeId) -> Option<&'static str> {
        self.nodes[parent.index()]
            .fields
            .iter()
            .find(|(_, value)| match value {
                Value::Node(id) => *id == child,
                Value::List(items) => items.contains(&child),
                _ => false,
            })
            .map(|(key, _)| *key)
    }

    /// Compares two sub-trees by shape and scalar values, ignoring private
    /// fields and comments.
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (left, right) = (self.node(a), self.node(b));
        if left.kind != right.kind {
            return false;
        }
        let public = |node: &Node| {
            node.fields
                .iter()
                .filter(|(k, _)| !k.starts_with(PRIVATE_PREFIX))
                .map(|(k, v)| (*k, v.clone()))
                .collect::<Vec<_>>()
        };
        let (lf, rf) = (public(left), public(right));
        if lf.len() != rf.len() {
            return false;
        }
        lf.iter().zip(&rf).all(|((lk, lv), (rk, rv))| {
            lk == rk
                && match (lv, rv) {
                    (Value::Node(x), Value::Node(y)) => self.structurally_equal(*x, *y),
                    (Value::List(xs), Value::List(ys)) => {
                        xs.len() == ys.len()
                            && xs.iter().zip(ys).all(|(x, y)| self.structurally_equal(*x, *y))
                    }
                    _ => lv == rv,
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_fields() {
        let mut tree = Tree::new(false);
        let id = tree.identifier("x");
        assert_eq!(tree.name(id), Some("x"));
        tree.set(id, "name", "y");
        assert_eq!(tree.name(id), Some("y"));
        tree.set(id, "$tag", 1.0);
        assert!(tree.get(id, "$tag").is_some());
        assert!(tree.children(id).is_empty());
    }

    #[test]
    fn test_children_skip_private_fields() {
        let mut tree = Tree::new(false);
        let a = tree.identifier("a");
        let b = tree.identifier("b");
        let call = tree.call(a, vec![b]);
        let hidden = tree.identifier("hidden");
        tree.set(call, "$extra", hidden);
        assert_eq!(tree.children(call), vec![a, b]);
        assert!(!tree.contains_child(call, hidden));
    }

    #[test]
    fn test_structural_equality() {
        let mut tree = Tree::new(false);
        let o1 = tree.identifier("o");
        let left = tree.member(o1, "p");
        let o2 = tree.identifier("o");
        let right = tree.member(o2, "p");
        let o3 = tree.identifier("o");
        let other = tree.member(o3, "q");
        assert!(tree.structurally_equal(left, right));
        assert!(!tree.structurally_equal(left, other));
    }
}
