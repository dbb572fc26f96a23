//! Driver: builds the pipeline from [`Options`] and runs it over one source
//! text at a time.

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use tracing::{debug, info};

use crate::codegen::Codegen;
use crate::options::Options;
use crate::parser;
use crate::transform::{
    Context, Eval, Minify, OpaquePredicates, Preparation, RenameLabels, StringConcealing,
    Transform,
};
use crate::{ObfuscateError, Result};

#[derive(Debug, Clone)]
pub struct Obfuscator {
    options: Options,
}

impl Obfuscator {
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The passes enabled by the options. [`Context::set_pipeline`] orders
    /// them by priority.
    fn passes(&self) -> Vec<Box<dyn Transform>> {
        let options = &self.options;
        let mut passes: Vec<Box<dyn Transform>> = vec![Box::new(Preparation::new())];
        if options.eval.is_enabled() {
            passes.push(Box::new(Eval::new()));
        }
        if options.opaque_predicates.is_enabled() {
            passes.push(Box::new(OpaquePredicates::new()));
        }
        if options.string_concealing.is_enabled() {
            passes.push(Box::new(StringConcealing::new()));
        }
        if options.rename_labels {
            passes.push(Box::new(RenameLabels::new()));
        }
        if options.minify {
            passes.push(Box::new(Minify::new()));
        }
        passes
    }

    pub fn obfuscate(&self, code: &str) -> Result<String> {
        let mut tree = parser::parse(code, self.options.module)?;
        let root = tree.root();
        debug!(nodes = tree.len(), "parsed input");

        let mut cx = Context::new(self.options.clone());
        cx.observe(&tree, root);
        cx.set_pipeline(self.passes());
        info!(passes = ?cx.pipeline_names(), "obfuscating");

        cx.run(&mut tree)?;

        let output = Codegen::new()
            .with_compact(self.options.compact)
            .build(&tree, root);
        info!(
            input = code.len(),
            output = output.len(),
            identifiers = cx.var_count(),
            "done"
        );

        if self.options.verify {
            verify(&output, self.options.module)?;
        }
        Ok(output)
    }
}

/// Re-parses generated code and runs oxc's semantic checks over it.
pub fn verify(code: &str, module: bool) -> Result<()> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs().with_module(module);
    let ret = Parser::new(&allocator, code, source_type).parse();
    if let Some(first) = ret.errors.first() {
        return Err(ObfuscateError::VerifyFailed(first.to_string()));
    }

    let semantic = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(&ret.program);
    if let Some(first) = semantic.errors.first() {
        return Err(ObfuscateError::VerifyFailed(first.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Preset, Probability};

    fn run_obfuscator(options: Options, code: &str) -> String {
        Obfuscator::new(options)
            .expect("options")
            .obfuscate(code)
            .expect("obfuscation failed")
    }

    fn seeded(options: Options) -> Options {
        Options {
            seed: Some(7),
            ..options
        }
    }

    #[test]
    fn test_default_pipeline() {
        let obfuscator = Obfuscator::new(Options::default()).unwrap();
        let names: Vec<&str> = obfuscator.passes().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Preparation", "RenameLabels"]);
    }

    #[test]
    fn test_pipeline_is_ordered_by_priority() {
        let mut cx = Context::new(Options::preset(Preset::High));
        let obfuscator = Obfuscator::new(Options::preset(Preset::High)).unwrap();
        cx.set_pipeline(obfuscator.passes());
        assert_eq!(
            cx.pipeline_names(),
            vec![
                "Preparation",
                "Eval",
                "OpaquePredicates",
                "StringConcealing",
                "RenameLabels",
                "Minify"
            ]
        );
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let options = Options {
            string_concealing: Probability::Chance(1.5),
            ..Options::default()
        };
        let err = Obfuscator::new(options).unwrap_err();
        assert!(matches!(err, ObfuscateError::InvalidOptions(_)), "got: {}", err);
    }

    #[test]
    fn test_parse_errors_surface() {
        let obfuscator = Obfuscator::new(Options::default()).unwrap();
        let err = obfuscator.obfuscate("function (").unwrap_err();
        assert!(matches!(err, ObfuscateError::ParseFailed(_)), "got: {}", err);
    }

    #[test]
    fn test_preparation_wraps_bodies() {
        let output = run_obfuscator(seeded(Options::default()), "if (a) b(); else c();");
        assert_eq!(output, "if(a){b();}else{c();}");
    }

    #[test]
    fn test_pretty_output() {
        let options = Options {
            compact: false,
            ..seeded(Options::default())
        };
        let output = run_obfuscator(options, "function f(){return 1;}");
        assert!(output.contains('\n'), "got: {}", output);
    }

    #[test]
    fn test_same_seed_same_output() {
        let code = "function greet(name) { if (name) { return 'Hello ' + name; } return 'nobody'; }";
        let first = run_obfuscator(seeded(Options::preset(Preset::High)), code);
        let second = run_obfuscator(seeded(Options::preset(Preset::High)), code);
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_preset_verifies() {
        let code = r#"
            var items = ["a", "b", "c"];
            outer: for (var i = 0; i < items.length; i++) {
                for (var j = 0; j < 3; j++) {
                    if (j === 1) continue outer;
                    if (items[i] === "c") break;
                }
            }
            function total(list) {
                var sum = 0;
                list.forEach(function (x) { sum += x.length; });
                return sum;
            }
            console.log(total(items), typeof undefined);
        "#;
        for preset in [Preset::Low, Preset::Medium, Preset::High] {
            // verify is on by default, so success means the output re-parsed
            run_obfuscator(seeded(Options::preset(preset)), code);
        }
    }

    #[test]
    fn test_verify_rejects_broken_code() {
        assert!(verify("var a = ;", false).is_err());
        assert!(verify("let a; let a;", false).is_err());
        assert!(verify("import x from 'y';", true).is_ok());
    }
}
