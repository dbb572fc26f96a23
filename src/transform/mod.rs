//! The pass abstraction and the per-run state shared by every pass.
//!
//! A pass decides per node whether it is interested (`matches`) and then
//! rewrites it (`transform`). Passes can run other passes before or after
//! their own walk, or fuse them into it. [`Context`] owns the pipeline so a
//! pass can send a freshly synthesized sub-tree through the passes that have
//! not run yet.

pub mod eval;
pub mod label;
pub mod minify;
pub mod naming;
pub mod opaque_predicates;
pub mod preparation;
pub mod rename_labels;
pub mod string_concealing;

pub use eval::Eval;
pub use label::Label;
pub use minify::Minify;
pub use naming::NameGenerator;
pub use opaque_predicates::OpaquePredicates;
pub use preparation::Preparation;
pub use rename_labels::RenameLabels;
pub use string_concealing::StringConcealing;

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::analysis::is_reserved;
use crate::options::{Choice, Options, Probability};
use crate::traverse::{Enter, Visitor, scan, walk};
use crate::tree::{Kind, NodeId, Tree};
use crate::{ObfuscateError, Result};

/// What the walk should do after a node was transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Stop the walk. Pending exit hooks are dropped.
    Exit,
    /// Call the pass's `exit` for this node once its children are done.
    OnExit,
}

/// Sub-passes attached to a pass.
#[derive(Default)]
pub struct Composition {
    pub before: Vec<Box<dyn Transform>>,
    pub after: Vec<Box<dyn Transform>>,
    /// Evaluated on every node of the owner's walk instead of walking
    /// separately.
    pub concurrent: Vec<Box<dyn Transform>>,
}

pub trait Transform {
    fn name(&self) -> &'static str;

    /// Position in the pipeline; lower runs first.
    fn priority(&self) -> u32 {
        0
    }

    fn composition(&mut self) -> Option<&mut Composition> {
        None
    }

    /// Runs once per `apply`, before the walk.
    fn prepare(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        Ok(())
    }

    fn matches(&mut self, tree: &Tree, node: NodeId, parents: &[NodeId], cx: &mut Context)
    -> bool;

    fn transform(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        cx: &mut Context,
    ) -> Result<Visit>;

    fn exit(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs once per `apply`, after the walk.
    fn finish(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _parents: &[NodeId],
        _cx: &mut Context,
    ) -> Result<()> {
        Ok(())
    }
}

fn named(pass: &'static str, source: ObfuscateError) -> ObfuscateError {
    ObfuscateError::Pass {
        pass,
        source: Box::new(source),
    }
}

/// Runs `pass` over the sub-tree at `node`: the `before` passes, then one walk
/// fusing the pass with its `concurrent` passes, then the `after` passes.
/// Errors are prefixed with the pass name.
pub fn apply(
    pass: &mut dyn Transform,
    tree: &mut Tree,
    node: NodeId,
    parents: &[NodeId],
    cx: &mut Context,
) -> Result<()> {
    let name = pass.name();
    let mut composition = pass.composition().map(std::mem::take).unwrap_or_default();
    trace!(pass = name, %node, "apply");
    let result = run_stages(pass, &mut composition, tree, node, parents, cx);
    if let Some(slot) = pass.composition() {
        *slot = composition;
    }
    result.map_err(|e| named(name, e))
}

fn run_stages(
    pass: &mut dyn Transform,
    composition: &mut Composition,
    tree: &mut Tree,
    node: NodeId,
    parents: &[NodeId],
    cx: &mut Context,
) -> Result<()> {
    cx.before_depth += 1;
    let before = composition
        .before
        .iter_mut()
        .try_for_each(|sub| apply(sub.as_mut(), tree, node, parents, cx));
    cx.before_depth -= 1;
    before?;

    pass.prepare(tree, node, parents, cx)?;
    for sub in &mut composition.concurrent {
        let name = sub.name();
        sub.prepare(tree, node, parents, cx)
            .map_err(|e| named(name, e))?;
    }

    {
        let mut passes: Vec<&mut dyn Transform> = Vec::with_capacity(1 + composition.concurrent.len());
        passes.push(&mut *pass);
        for sub in &mut composition.concurrent {
            passes.push(sub.as_mut());
        }
        let mut visitor = PassVisitor { passes, cx: &mut *cx };
        walk(tree, node, parents, &mut visitor)?;
    }

    pass.finish(tree, node, parents, cx)?;
    for sub in &mut composition.concurrent {
        let name = sub.name();
        sub.finish(tree, node, parents, cx)
            .map_err(|e| named(name, e))?;
    }

    composition
        .after
        .iter_mut()
        .try_for_each(|sub| apply(sub.as_mut(), tree, node, parents, cx))
}

struct PassVisitor<'a> {
    passes: Vec<&'a mut dyn Transform>,
    cx: &'a mut Context,
}

impl Visitor for PassVisitor<'_> {
    /// Indices of the passes that asked for an exit call.
    type Deferred = Vec<usize>;

    fn enter(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
    ) -> Result<Enter<Vec<usize>>> {
        let mut scheduled = Vec::new();
        for (index, pass) in self.passes.iter_mut().enumerate() {
            // an earlier pass may have detached this node
            if tree.is(node, Kind::Detached) {
                break;
            }
            if !pass.matches(tree, node, parents, self.cx) {
                continue;
            }
            let visit = if index == 0 {
                pass.transform(tree, node, parents, self.cx)?
            } else {
                let name = pass.name();
                pass.transform(tree, node, parents, self.cx)
                    .map_err(|e| named(name, e))?
            };
            match visit {
                Visit::Continue => {}
                Visit::Exit => return Ok(Enter::Exit),
                Visit::OnExit => scheduled.push(index),
            }
        }
        if scheduled.is_empty() {
            Ok(Enter::Continue)
        } else {
            Ok(Enter::Defer(scheduled))
        }
    }

    fn exit(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
        deferred: Vec<usize>,
    ) -> Result<()> {
        for index in deferred {
            let pass = &mut self.passes[index];
            let result = pass.exit(tree, node, parents, self.cx);
            if index == 0 {
                result?;
            } else {
                let name = pass.name();
                result.map_err(|e| named(name, e))?;
            }
        }
        Ok(())
    }
}

/// State shared by all passes of one obfuscation run.
pub struct Context {
    pub options: Options,
    rng: StdRng,
    var_count: usize,
    mangle_index: usize,
    names: FxHashSet<String>,
    pipeline: Vec<Option<Box<dyn Transform>>>,
    cursor: usize,
    before_depth: usize,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("var_count", &self.var_count)
            .field("names", &self.names.len())
            .field("pipeline", &self.pipeline.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(options: Options) -> Self {
        let rng = options
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            options,
            rng,
            var_count: 0,
            mangle_index: 0,
            names: FxHashSet::default(),
            pipeline: Vec::new(),
            cursor: 0,
            before_depth: 0,
        }
    }

    /// Installs the pipeline, ordered by priority.
    pub fn set_pipeline(&mut self, mut passes: Vec<Box<dyn Transform>>) {
        passes.sort_by_key(|p| p.priority());
        self.pipeline = passes.into_iter().map(Some).collect();
    }

    pub fn pipeline_names(&self) -> Vec<&'static str> {
        self.pipeline.iter().flatten().map(|p| p.name()).collect()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Number of identifiers generated so far in this run.
    pub const fn var_count(&self) -> usize {
        self.var_count
    }

    /// Resolves one of the per-pass probability settings.
    pub fn chance(&mut self, select: impl Fn(&Options) -> &Probability) -> bool {
        select(&self.options).compute(&mut self.rng).is_on()
    }

    /// Records every identifier name in `tree` so generated names avoid them.
    pub fn observe(&mut self, tree: &Tree, node: NodeId) {
        scan(tree, node, &[], |id, _| {
            if let Some(name) = tree.name(id) {
                if !self.names.contains(name) {
                    self.names.insert(name.to_string());
                }
            }
            true
        });
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn candidate(&mut self, mode: &str) -> String {
        match mode {
            "hexadecimal" => naming::hexadecimal(&mut self.rng),
            "mangled" => {
                let name = naming::alphabetic(self.mangle_index);
                self.mangle_index += 1;
                name
            }
            "number" => format!("var_{}", self.var_count + 1),
            "zeroWidth" => naming::zero_width(self.var_count),
            _ => {
                let len = self.rng.random_range(6..=10);
                naming::random_string(&mut self.rng, len)
            }
        }
    }

    /// A fresh variable name in a mode picked from `identifierGenerator`,
    /// distinct from every name in the program and every earlier result.
    pub fn generate_identifier(&mut self) -> String {
        loop {
            let mode = match self.options.identifier_generator.compute(&mut self.rng) {
                Choice::Mode(mode) => mode.to_string(),
                _ => "randomized".to_string(),
            };
            let name = self.candidate(&mode);
            if !is_reserved(&name) && self.names.insert(name.clone()) {
                self.var_count += 1;
                return name;
            }
            // numbered and zero-width names advance with the counter
            self.var_count += 1;
        }
    }

    /// A fresh `__p_xxxx` name for internal helpers.
    pub fn placeholder(&mut self) -> String {
        loop {
            let name = format!("__p_{}", naming::random_string(&mut self.rng, 4));
            if self.names.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Logs a value a pass chose to leave alone.
    pub fn skip(&self, pass: &str, reason: impl fmt::Display) {
        if self.options.verbose {
            warn!(pass, "{reason}");
        } else {
            debug!(pass, "{reason}");
        }
    }

    /// Runs every installed pass over the whole tree in priority order.
    pub fn run(&mut self, tree: &mut Tree) -> Result<()> {
        let root = tree.root();
        for index in 0..self.pipeline.len() {
            let Some(mut pass) = self.pipeline[index].take() else {
                continue;
            };
            self.cursor = index;
            debug!(pass = pass.name(), "running");
            let result = apply(pass.as_mut(), tree, root, &[], self);
            self.pipeline[index] = Some(pass);
            result?;
        }
        Ok(())
    }

    /// Sends a sub-tree synthesized by the running pass through the passes
    /// that have not run yet. From inside a `before` stage the passes ahead
    /// of the current one are used instead.
    pub fn dynamically_obfuscate(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        parents: &[NodeId],
    ) -> Result<()> {
        let current = self.cursor;
        let range = if self.before_depth > 0 {
            0..current
        } else {
            current + 1..self.pipeline.len()
        };
        for index in range {
            let Some(mut pass) = self.pipeline[index].take() else {
                continue;
            };
            trace!(pass = pass.name(), %node, "dynamic");
            self.cursor = index;
            let depth = std::mem::take(&mut self.before_depth);
            let result = apply(pass.as_mut(), tree, node, parents, self);
            self.before_depth = depth;
            self.cursor = current;
            self.pipeline[index] = Some(pass);
            result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Codegen;
    use crate::parser::parse;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records what happens to identifiers and renames them with a suffix.
    struct Tagger {
        name: &'static str,
        priority: u32,
        log: Log,
        composition: Composition,
        exit_on: Option<&'static str>,
    }

    impl Tagger {
        fn new(name: &'static str, priority: u32, log: &Log) -> Self {
            Self {
                name,
                priority,
                log: log.clone(),
                composition: Composition::default(),
                exit_on: None,
            }
        }
    }

    impl Transform for Tagger {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn composition(&mut self) -> Option<&mut Composition> {
            Some(&mut self.composition)
        }

        fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
            tree.is(node, Kind::Identifier)
        }

        fn transform(
            &mut self,
            tree: &mut Tree,
            node: NodeId,
            _: &[NodeId],
            _: &mut Context,
        ) -> Result<Visit> {
            let current = tree.name(node).unwrap_or_default().to_string();
            self.log.borrow_mut().push(format!("{}:{}", self.name, current));
            if self.exit_on == Some(current.as_str()) {
                return Ok(Visit::Exit);
            }
            Ok(Visit::OnExit)
        }

        fn exit(
            &mut self,
            tree: &mut Tree,
            node: NodeId,
            _: &[NodeId],
            _: &mut Context,
        ) -> Result<()> {
            let renamed = format!("{}{}", tree.name(node).unwrap_or_default(), self.name);
            tree.set(node, "name", renamed);
            Ok(())
        }
    }

    fn output(tree: &Tree) -> String {
        Codegen::new().with_compact(true).build(tree, tree.root())
    }

    #[test]
    fn test_before_concurrent_after_order() {
        let log: Log = Rc::default();
        let mut main = Tagger::new("M", 1, &log);
        main.composition.before.push(Box::new(Tagger::new("B", 0, &log)));
        main.composition.concurrent.push(Box::new(Tagger::new("C", 0, &log)));
        main.composition.after.push(Box::new(Tagger::new("A", 0, &log)));

        let mut tree = parse("x;", false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options::default());
        apply(&mut main, &mut tree, root, &[], &mut cx).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["B:x", "M:xB", "C:xB", "A:xBMC"]
        );
        assert_eq!(output(&tree), "xBMCA;");
        // composition survives the apply
        assert_eq!(main.composition.before.len(), 1);
    }

    #[test]
    fn test_exit_stops_walk() {
        let log: Log = Rc::default();
        let mut pass = Tagger::new("T", 0, &log);
        pass.exit_on = Some("b");
        let mut tree = parse("a; b; c;", false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options::default());
        apply(&mut pass, &mut tree, root, &[], &mut cx).unwrap();
        assert_eq!(*log.borrow(), vec!["T:a", "T:b"]);
        assert_eq!(output(&tree), "aT;b;c;");
    }

    struct Failing;

    impl Transform for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
            tree.is(node, Kind::Identifier)
        }

        fn transform(
            &mut self,
            tree: &mut Tree,
            node: NodeId,
            _: &[NodeId],
            _: &mut Context,
        ) -> Result<Visit> {
            Err(ObfuscateError::MissingField {
                node,
                kind: tree.kind(node),
                field: "init",
            })
        }
    }

    #[test]
    fn test_errors_carry_pass_name() {
        let mut tree = parse("x;", false).unwrap();
        let root = tree.root();
        let mut cx = Context::new(Options::default());
        let err = apply(&mut Failing, &mut tree, root, &[], &mut cx).unwrap_err();
        assert!(err.to_string().starts_with("Failing: "), "{err}");
        assert!(err.is_invariant_violation());
    }

    /// Asks for dynamic obfuscation of identifiers starting with `y`.
    struct Dynamic {
        log: Log,
    }

    impl Transform for Dynamic {
        fn name(&self) -> &'static str {
            "Dynamic"
        }

        fn priority(&self) -> u32 {
            5
        }

        fn matches(&mut self, tree: &Tree, node: NodeId, _: &[NodeId], _: &mut Context) -> bool {
            tree.name(node).is_some_and(|name| name.starts_with('y'))
        }

        fn transform(
            &mut self,
            tree: &mut Tree,
            node: NodeId,
            parents: &[NodeId],
            cx: &mut Context,
        ) -> Result<Visit> {
            self.log.borrow_mut().push("dynamic".to_string());
            cx.dynamically_obfuscate(tree, node, parents)?;
            Ok(Visit::Continue)
        }
    }

    #[test]
    fn test_dynamic_obfuscation_runs_later_passes_only() {
        let log: Log = Rc::default();
        let mut cx = Context::new(Options::default());
        cx.set_pipeline(vec![
            Box::new(Tagger::new("Late", 9, &log)),
            Box::new(Dynamic { log: log.clone() }),
            Box::new(Tagger::new("Early", 1, &log)),
        ]);
        assert_eq!(cx.pipeline_names(), vec!["Early", "Dynamic", "Late"]);

        let mut tree = parse("x; y;", false).unwrap();
        cx.run(&mut tree).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "Early:x",
                "Early:y",
                "dynamic",
                "Late:yEarly",
                "Late:xEarly",
                "Late:yEarlyLate",
            ]
        );
        assert_eq!(output(&tree), "xEarlyLate;yEarlyLateLate;");
    }

    #[test]
    fn test_generated_identifiers_are_unique() {
        let mut options = Options::default();
        options.seed = Some(11);
        options.identifier_generator = Probability::Modes(vec![
            "mangled".to_string(),
            "number".to_string(),
            "hexadecimal".to_string(),
            "zeroWidth".to_string(),
            "randomized".to_string(),
        ]);
        let mut cx = Context::new(options);
        let tree = parse("var a, b, c, var_1;", false).unwrap();
        cx.observe(&tree, tree.root());

        let mut seen = FxHashSet::default();
        for _ in 0..500 {
            let name = cx.generate_identifier();
            assert!(!["a", "b", "c", "var_1"].contains(&name.as_str()), "{name}");
            assert!(!is_reserved(&name), "{name}");
            assert!(seen.insert(name));
        }
        let placeholder = cx.placeholder();
        assert!(placeholder.starts_with("__p_"));
        assert!(cx.var_count() >= 500);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let names = |seed| {
            let mut cx = Context::new(Options {
                seed: Some(seed),
                ..Options::default()
            });
            (0..5).map(|_| cx.generate_identifier()).collect::<Vec<_>>()
        };
        assert_eq!(names(42), names(42));
        assert_ne!(names(42), names(43));
    }
}
