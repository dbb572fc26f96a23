//! Moves string literals into one encoded array behind a decoding getter.
//!
//! Literal sites become `getter(index)`. The array, a decode function and a
//! cached getter are prepended to the program when the pass finishes at the
//! root, so literals reached through dynamic re-obfuscation share the same
//! array as the rest of the program.

pub mod encoding;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing::debug;

pub use self::encoding::Codec;
use super::{Context, Transform, Visit};
use crate::Result;
use crate::template::Template;
use crate::tree::{Kind, NodeId, Tree, prepend};

lazy_static! {
    static ref HELPERS: Template = Template::new(
        r#"
var {cache} = {};
function {decode}(str) {
  var digits = "{alphabet}", out = "", i = 0, n, j;
  for (; i + 5 <= str.length; i += 5) {
    for (n = 0, j = 0; j < 5; j++) n = n * 85 + digits.indexOf(str.charAt(i + j));
    out += String.fromCharCode(Math.floor(n / 65536), n % 65536);
  }
  if (i < str.length) {
    for (n = 0; i < str.length; i++) n = n * 85 + digits.indexOf(str.charAt(i));
    out += String.fromCharCode(n);
  }
  return out;
}
function {getter}(index) {
  if (!(index in {cache})) {
    {cache}[index] = {decode}({array}[index]);
  }
  return {cache}[index];
}
"#
    );
}

#[derive(Debug, Clone)]
struct Helpers {
    array: String,
    cache: String,
    decode: String,
    getter: String,
}

pub struct StringConcealing {
    codec: Option<Codec>,
    helpers: Option<Helpers>,
    /// Array index per concealed value.
    index: FxHashMap<String, usize>,
    encoded: Vec<String>,
}

impl StringConcealing {
    pub fn new() -> Self {
        Self {
            codec: None,
            helpers: None,
            index: FxHashMap::default(),
            encoded: Vec::new(),
        }
    }

    fn is_key_of(tree: &Tree, parent: NodeId, node: NodeId) -> bool {
        matches!(
            tree.kind(parent),
            Kind::Property | Kind::MethodDefinition | Kind::PropertyDefinition
        ) && tree.child(parent, "key") == Some(node)
    }

    /// Literals whose position requires a plain string.
    fn is_excluded(tree: &Tree, node: NodeId, value: &str, parents: &[NodeId]) -> bool {
        let Some(&parent) = parents.first() else {
            return false;
        };
        let field = tree.field_of(parent, node);
        match tree.kind(parent) {
            Kind::ImportDeclaration
            | Kind::ExportNamedDeclaration
            | Kind::ExportAllDeclaration
            | Kind::ImportExpression => field == Some("source"),
            Kind::ImportSpecifier
            | Kind::ImportDefaultSpecifier
            | Kind::ImportNamespaceSpecifier
            | Kind::ExportSpecifier => true,
            Kind::ExpressionStatement => tree.get(parent, "directive").is_some(),
            Kind::CallExpression => {
                field == Some("arguments")
                    && tree
                        .child(parent, "callee")
                        .is_some_and(|callee| tree.is_identifier(callee, "require"))
            }
            Kind::MethodDefinition | Kind::PropertyDefinition
                if Self::is_key_of(tree, parent, node) =>
            {
                value == "constructor" || value == "__proto__"
            }
            Kind::Property if Self::is_key_of(tree, parent, node) => value == "__proto__",
            _ => false,
        }
    }

    /// Array index for `value`, encoding it on first sight. `None` when the
    /// value does not survive the codec.
    fn index_of(&mut self, value: &str, cx: &Context) -> Option<usize> {
        if let Some(index) = self.index.get(value) {
            return Some(*index);
        }
        let codec = self.codec.as_ref()?;
        if !codec.round_trips(value) {
            cx.skip(self.name(), format_args!("string {value:?} does not survive encoding"));
            return None;
        }
        let index = self.encoded.len();
        self.encoded.push(codec.encode(value));
        self.index.insert(value.to_string(), index);
        Some(index)
    }
}

impl Default for StringConcealing {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for StringConcealing {
    fn name(&self) -> &'static str {
        "StringConcealing"
    }

    fn priority(&self) -> u32 {
        17
    }

    fn prepare(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<()> {
        if self.codec.is_none() {
            self.codec = Some(Codec::shuffled(cx.rng()));
        }
        if self.helpers.is_none() {
            self.helpers = Some(Helpers {
                array: cx.generate_identifier(),
                cache: cx.generate_identifier(),
                decode: cx.generate_identifier(),
                getter: cx.generate_identifier(),
            });
        }
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, parents: &[NodeId], cx: &mut Context) -> bool {
        let Some(value) = tree.string_value(node) else {
            return false;
        };
        !value.is_empty()
            && !Self::is_excluded(tree, node, value, parents)
            && cx.chance(|o| &o.string_concealing)
    }

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<Visit> {
        let Some(value) = tree.string_value(node).map(str::to_string) else {
            return Ok(Visit::Continue);
        };
        let Some(index) = self.index_of(&value, cx) else {
            return Ok(Visit::Continue);
        };
        let Some(getter) = self.helpers.as_ref().map(|h| h.getter.clone()) else {
            return Ok(Visit::Continue);
        };

        if let Some(&parent) = parents.first() {
            if Self::is_key_of(tree, parent, node) {
                tree.set(parent, "computed", true);
                tree.set(parent, "shorthand", false);
            }
        }
        let callee = tree.identifier(&getter);
        let argument = tree.number(index as f64);
        let call = tree.call(callee, vec![argument]);
        tree.replace(node, call, "StringConcealing");
        Ok(Visit::Continue)
    }

    fn finish(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        if node != tree.root() || self.encoded.is_empty() {
            return Ok(());
        }
        let (Some(codec), Some(helpers)) = (self.codec.take(), self.helpers.take()) else {
            return Ok(());
        };
        debug!(strings = self.encoded.len(), "emitting string array");

        let mut elements = Vec::with_capacity(self.encoded.len());
        for encoded in self.encoded.drain(..) {
            elements.push(tree.string(&encoded));
        }
        self.index.clear();
        let array = tree.array(elements);
        let mut statements = vec![tree.variable("var", &helpers.array, Some(array))];

        let alphabet = codec.alphabet();
        statements.extend(HELPERS.compile(
            tree,
            &[
                ("cache", &helpers.cache),
                ("decode", &helpers.decode),
                ("getter", &helpers.getter),
                ("array", &helpers.array),
                ("alphabet", &alphabet),
            ],
        )?);
        prepend(tree, node, parents, statements)
    }
}
