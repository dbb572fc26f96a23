//! # js-obfuscate-rs
//!
//! A source-to-source JavaScript obfuscator. Source is parsed with oxc,
//! lowered into a mutable arena tree, rewritten by an ordered pipeline of
//! transforms and printed back out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use js_obfuscate_rs::{Obfuscator, Options};
//!
//! let options = Options {
//!     string_concealing: true.into(),
//!     ..Options::default()
//! };
//! let obfuscator = Obfuscator::new(options).expect("valid options");
//! let output = obfuscator
//!     .obfuscate("function f(name) { return 'Hello ' + name; }")
//!     .expect("obfuscation failed");
//! assert!(!output.contains("'Hello '"));
//! ```

pub mod analysis;
pub mod codegen;
pub mod obfuscator;
pub mod options;
pub mod output;
pub mod parser;
pub mod template;
pub mod transform;
pub mod traverse;
pub mod tree;

pub use codegen::Codegen;
pub use obfuscator::Obfuscator;
pub use options::{Options, Preset, Probability};
pub use transform::{Context, Transform};
pub use tree::{Kind, NodeId, Tree};

#[derive(Debug, thiserror::Error)]
pub enum ObfuscateError {
    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("unsupported syntax `{kind}` at offset {offset}")]
    Unsupported { kind: String, offset: u32 },

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("broken parent chain: {kind} {node} is not held by {parent_kind} {parent}")]
    BrokenChain {
        node: NodeId,
        kind: Kind,
        parent: NodeId,
        parent_kind: Kind,
    },

    #[error("{kind} {node} was reached twice in one traversal")]
    VisitedTwice { node: NodeId, kind: Kind },

    #[error("{kind} {node} is not present in {parent_kind} {parent}")]
    NotInParent {
        node: NodeId,
        kind: Kind,
        parent: NodeId,
        parent_kind: Kind,
    },

    #[error("no enclosing block for {kind} {node}")]
    NoEnclosingBlock { node: NodeId, kind: Kind },

    #[error("{kind} {node} is missing `{field}`")]
    MissingField {
        node: NodeId,
        kind: Kind,
        field: &'static str,
    },

    #[error("{pass}: {source}")]
    Pass {
        pass: &'static str,
        source: Box<ObfuscateError>,
    },

    #[error("generated code does not parse: {0}")]
    VerifyFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ObfuscateError {
    /// True for errors caused by a pass corrupting the tree rather than by
    /// the input program or the options.
    pub const fn is_invariant_violation(&self) -> bool {
        match self {
            Self::BrokenChain { .. }
            | Self::VisitedTwice { .. }
            | Self::NotInParent { .. }
            | Self::NoEnclosingBlock { .. }
            | Self::MissingField { .. } => true,
            Self::Pass { source, .. } => source.is_invariant_violation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ObfuscateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_error_is_prefixed() {
        let inner = ObfuscateError::VisitedTwice {
            node: Tree::new(false).root(),
            kind: Kind::Program,
        };
        let err = ObfuscateError::Pass {
            pass: "Minify",
            source: Box::new(inner),
        };
        let message = err.to_string();
        assert!(message.starts_with("Minify: "), "got: {}", message);
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_basic_obfuscate() {
        let obfuscator = Obfuscator::new(Options::default()).expect("options");
        let result = obfuscator
            .obfuscate("function test(){return 42;}")
            .expect("obfuscation failed");

        assert!(result.contains("function test()"), "got: {}", result);
        assert!(result.contains("return 42"), "got: {}", result);
    }
}
