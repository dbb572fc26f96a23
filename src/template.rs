//! Source templates for helper code synthesized by passes.
//!
//! `{name}` placeholders are substituted before parsing. Braces that do not
//! name a supplied variable are left alone, so ordinary JavaScript blocks
//! need no escaping.

use crate::parser::parse_into;
use crate::tree::{Kind, NodeId, Tree};
use crate::{ObfuscateError, Result};

#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn fill(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.source.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }

    /// Parses the filled template into detached statements of `tree`.
    pub fn compile(&self, tree: &mut Tree, vars: &[(&str, &str)]) -> Result<Vec<NodeId>> {
        parse_into(tree, &self.fill(vars), false)
    }

    pub fn single(&self, tree: &mut Tree, vars: &[(&str, &str)]) -> Result<NodeId> {
        let statements = self.compile(tree, vars)?;
        match statements.as_slice() {
            [only] => Ok(*only),
            _ => Err(ObfuscateError::ParseFailed(format!(
                "template produced {} statements, expected one",
                statements.len()
            ))),
        }
    }

    pub fn expression(&self, tree: &mut Tree, vars: &[(&str, &str)]) -> Result<NodeId> {
        let source = format!("({})", self.fill(vars));
        let statements = parse_into(tree, &source, false)?;
        if let [stmt] = statements.as_slice() {
            if tree.is(*stmt, Kind::ExpressionStatement) {
                if let Some(expression) = tree.child(*stmt, "expression") {
                    return Ok(expression);
                }
            }
        }
        Err(ObfuscateError::ParseFailed(
            "template is not a single expression".to_string(),
        ))
    }
}
