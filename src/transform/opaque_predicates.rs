//! Adds always-true predicates to branch and loop tests.
//!
//! Predicates read properties of one shared object declared at the top of
//! the program. Properties are added lazily as predicates need them.

use lazy_static::lazy_static;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::debug;

use super::naming::random_string;
use super::{Context, NameGenerator, Transform, Visit};
use crate::Result;
use crate::template::Template;
use crate::tree::{Kind, NodeId, Tree, Value, prepend};

lazy_static! {
    static ref COUNTER: Template = Template::new(
        r"
function () {
  var list = [0];
  return function () {
    list.push(list.length);
    var size = list.length;
    if (size > 16) {
      list.length = 1;
    }
    return size;
  };
}()"
    );
}

const MAX_FACTS: usize = 12;
const NEW_FACT_CHANCE: f64 = 0.3;

/// Value stored on the predicate object.
#[derive(Debug, Clone, PartialEq)]
enum Fact {
    /// Closure pushing onto a private array; returns the new length, which
    /// is always at least 2.
    Counter,
    Number(u32),
    Text(String),
}

/// Comparison a predicate performs against a [`Fact`].
#[derive(Debug, Clone, PartialEq)]
enum Check {
    CounterAbove(u32),
    Above(u32),
    CharCode { index: usize, code: u16 },
}

impl Fact {
    fn random(kind: usize, rng: &mut StdRng) -> Self {
        match kind {
            0 => Self::Counter,
            1 => Self::Number(rng.random_range(10..1000)),
            _ => {
                let len = rng.random_range(5..=9);
                Self::Text(random_string(rng, len))
            }
        }
    }

    const fn kind(&self) -> usize {
        match self {
            Self::Counter => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }

    fn check(&self, rng: &mut StdRng) -> Check {
        match self {
            Self::Counter => Check::CounterAbove(1),
            Self::Number(value) => Check::Above(rng.random_range(0..*value)),
            Self::Text(text) => {
                let units: Vec<u16> = text.encode_utf16().collect();
                let index = rng.random_range(0..units.len());
                Check::CharCode {
                    index,
                    code: units[index],
                }
            }
        }
    }
}

pub struct OpaquePredicates {
    object: Option<String>,
    keys: NameGenerator,
    facts: Vec<(String, Fact)>,
    /// Property nodes of the predicate object, in their current order.
    properties: Vec<NodeId>,
}

impl OpaquePredicates {
    pub fn new() -> Self {
        Self {
            object: None,
            keys: NameGenerator::new(),
            facts: Vec::new(),
            properties: Vec::new(),
        }
    }

    fn add_fact(&mut self, tree: &mut Tree, kind: usize, rng: &mut StdRng) -> Result<usize> {
        let fact = Fact::random(kind, rng);
        let value = match &fact {
            Fact::Counter => COUNTER.expression(tree, &[])?,
            Fact::Number(n) => tree.number(f64::from(*n)),
            Fact::Text(text) => tree.string(text),
        };
        let name = self.keys.generate();
        let key = tree.identifier(&name);
        let property = tree.property(key, value, false);
        self.properties.push(property);
        self.properties.shuffle(rng);
        self.facts.push((name, fact));
        Ok(self.facts.len() - 1)
    }

    /// Builds a fresh always-true expression.
    fn predicate(&mut self, tree: &mut Tree, object: &str, rng: &mut StdRng) -> Result<NodeId> {
        let kind = rng.random_range(0..3);
        let existing: Vec<usize> = self
            .facts
            .iter()
            .enumerate()
            .filter(|(_, (_, fact))| fact.kind() == kind)
            .map(|(i, _)| i)
            .collect();
        let fresh = self.facts.len() < MAX_FACTS && rng.random_bool(NEW_FACT_CHANCE);
        let reuse = if fresh {
            None
        } else {
            existing.choose(rng).copied()
        };
        let index = match reuse {
            Some(index) => index,
            None => self.add_fact(tree, kind, rng)?,
        };

        let (key, fact) = self.facts[index].clone();
        let receiver = tree.identifier(object);
        let target = tree.member(receiver, &key);
        let expression = match fact.check(rng) {
            Check::CounterAbove(bound) => {
                let call = tree.call(target, Vec::new());
                let bound = tree.number(f64::from(bound));
                tree.binary(">", call, bound)
            }
            Check::Above(bound) => {
                let bound = tree.number(f64::from(bound));
                tree.binary(">", target, bound)
            }
            Check::CharCode { index, code } => {
                let method = tree.member(target, "charCodeAt");
                let index = tree.number(index as f64);
                let call = tree.call(method, vec![index]);
                let code = tree.number(f64::from(code));
                tree.binary("===", call, code)
            }
        };
        Ok(expression)
    }
}

impl Default for OpaquePredicates {
    fn default() -> Self {
        Self::new()
    }
}

fn is_truthy_literal(tree: &Tree, node: NodeId) -> bool {
    if !tree.is(node, Kind::Literal) {
        return false;
    }
    match tree.get(node, "value") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Num(n)) => *n != 0.0 && !n.is_nan(),
        Some(Value::Str(s)) => !s.is_empty(),
        _ => false,
    }
}

impl Transform for OpaquePredicates {
    fn name(&self) -> &'static str {
        "OpaquePredicates"
    }

    fn priority(&self) -> u32 {
        13
    }

    fn prepare(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<()> {
        if self.object.is_none() {
            self.object = Some(cx.generate_identifier());
        }
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], cx: &mut Context) -> bool {
        let eligible = match tree.kind(node) {
            Kind::IfStatement
            | Kind::WhileStatement
            | Kind::DoWhileStatement
            | Kind::ForStatement
            | Kind::ConditionalExpression => true,
            Kind::SwitchCase => tree.child(node, "test").is_some(),
            _ => false,
        };
        eligible && cx.chance(|o| &o.opaque_predicates)
    }

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<Visit> {
        let Some(object) = self.object.clone() else {
            return Ok(Visit::Continue);
        };
        let predicate = self.predicate(tree, &object, cx.rng())?;

        let Some(test) = tree.child(node, "test") else {
            // `for (;;)`
            tree.set(node, "test", predicate);
            return Ok(Visit::Continue);
        };
        let switch_case = tree.is(node, Kind::SwitchCase);
        if !switch_case && is_truthy_literal(tree, test) {
            tree.replace(test, predicate, "OpaquePredicates");
            return Ok(Visit::Continue);
        }

        let original = tree.relocate(test);
        let combined = if switch_case {
            tree.logical("&&", predicate, original)
        } else {
            tree.logical("&&", original, predicate)
        };
        tree.replace(test, combined, "OpaquePredicates");
        Ok(Visit::Continue)
    }

    fn finish(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        if node != tree.root() || self.properties.is_empty() {
            return Ok(());
        }
        let Some(object) = self.object.take() else {
            return Ok(());
        };
        debug!(properties = self.properties.len(), "emitting predicate object");
        let properties = std::mem::take(&mut self.properties);
        self.facts.clear();
        let value = tree.object(properties);
        let declaration = tree.variable("var", &object, Some(value));
        prepend(tree, node, parents, vec![declaration])
    }
}
