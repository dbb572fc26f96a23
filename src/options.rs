use std::collections::BTreeMap;
use std::default::Default;

use rand::Rng;
use rand::seq::IndexedRandom;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{ObfuscateError, Result};

/// Names accepted by `identifierGenerator`.
pub const IDENTIFIER_MODES: [&str; 5] = ["randomized", "hexadecimal", "mangled", "number", "zeroWidth"];

/// A per-transform setting: a switch, a chance, a fixed mode, a set of modes
/// picked uniformly, or modes picked by weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Probability {
    Toggle(bool),
    Chance(f64),
    Mode(String),
    Modes(Vec<String>),
    Weighted(BTreeMap<String, f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<'a> {
    Off,
    On,
    Mode(&'a str),
}

impl<'a> Choice<'a> {
    pub const fn is_on(self) -> bool {
        !matches!(self, Self::Off)
    }

    pub const fn mode(self) -> Option<&'a str> {
        match self {
            Self::Mode(mode) => Some(mode),
            _ => None,
        }
    }
}

impl Probability {
    /// Resolves the setting for one decision.
    pub fn compute<R: Rng + ?Sized>(&self, rng: &mut R) -> Choice<'_> {
        match self {
            Self::Toggle(false) => Choice::Off,
            Self::Toggle(true) => Choice::On,
            Self::Chance(p) if p.is_nan() => Choice::Off,
            Self::Chance(p) => {
                if rng.random_bool(p.clamp(0.0, 1.0)) {
                    Choice::On
                } else {
                    Choice::Off
                }
            }
            Self::Mode(mode) => Choice::Mode(mode),
            Self::Modes(modes) => modes
                .choose(rng)
                .map_or(Choice::Off, |mode| Choice::Mode(mode)),
            Self::Weighted(weights) => {
                let usable = |w: &f64| w.is_finite() && *w > 0.0;
                let total: f64 = weights.values().filter(|w| usable(*w)).sum();
                if !total.is_finite() || total <= 0.0 {
                    return Choice::Off;
                }
                let mut pick = rng.random_range(0.0..total);
                for (mode, weight) in weights.iter().filter(|(_, w)| usable(*w)) {
                    if pick < *weight {
                        return Choice::Mode(mode);
                    }
                    pick -= weight;
                }
                weights
                    .iter()
                    .rev()
                    .find(|(_, w)| usable(*w))
                    .map_or(Choice::Off, |(mode, _)| Choice::Mode(mode))
            }
        }
    }

    /// Whether the setting can resolve to anything but `Off`.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(on) => *on,
            Self::Chance(p) => *p > 0.0,
            Self::Mode(_) => true,
            Self::Modes(modes) => !modes.is_empty(),
            Self::Weighted(weights) => weights.values().any(|w| *w > 0.0),
        }
    }

    fn modes(&self) -> Vec<&str> {
        match self {
            Self::Mode(mode) => vec![mode.as_str()],
            Self::Modes(modes) => modes.iter().map(String::as_str).collect(),
            Self::Weighted(weights) => weights.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn validate(&self, field: &str) -> Result<()> {
        match self {
            Self::Chance(p) if !(0.0..=1.0).contains(p) => Err(ObfuscateError::InvalidOptions(
                format!("{field}: probability {p} is outside 0..=1"),
            )),
            Self::Weighted(weights) if weights.values().any(|w| *w < 0.0 || !w.is_finite()) => {
                Err(ObfuscateError::InvalidOptions(format!(
                    "{field}: weights must be finite and non-negative"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Probability {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl From<bool> for Probability {
    fn from(value: bool) -> Self {
        Self::Toggle(value)
    }
}

impl From<f64> for Probability {
    fn from(value: f64) -> Self {
        Self::Chance(value)
    }
}

impl From<&str> for Probability {
    fn from(value: &str) -> Self {
        Self::Mode(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub identifier_generator: Probability,
    pub string_concealing: Probability,
    pub opaque_predicates: Probability,
    pub eval: Probability,
    pub minify: bool,
    pub rename_labels: bool,
    pub compact: bool,
    pub module: bool,
    pub verify: bool,
    pub verbose: bool,
    pub seed: Option<u64>,
    pub global_variables: FxHashSet<String>,
}

impl Default for Options {
    fn default() -> Self {
        let global_variables = [
            "window",
            "document",
            "globalThis",
            "global",
            "self",
            "console",
            "require",
            "module",
            "exports",
            "process",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            identifier_generator: Probability::Mode("randomized".to_string()),
            string_concealing: Probability::default(),
            opaque_predicates: Probability::default(),
            eval: Probability::default(),
            minify: false,
            rename_labels: true,
            compact: true,
            module: false,
            verify: true,
            verbose: false,
            seed: None,
            global_variables,
        }
    }
}

impl Options {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            minify: true,
            ..Self::default()
        };
        match preset {
            Preset::Low => Self {
                string_concealing: Probability::Chance(0.5),
                ..base
            },
            Preset::Medium => Self {
                identifier_generator: Probability::Modes(vec![
                    "randomized".to_string(),
                    "hexadecimal".to_string(),
                ]),
                string_concealing: Probability::Chance(0.75),
                opaque_predicates: Probability::Chance(0.5),
                ..base
            },
            Preset::High => Self {
                identifier_generator: Probability::Weighted(BTreeMap::from([
                    ("hexadecimal".to_string(), 0.5),
                    ("mangled".to_string(), 0.25),
                    ("zeroWidth".to_string(), 0.25),
                ])),
                string_concealing: Probability::Toggle(true),
                opaque_predicates: Probability::Chance(0.75),
                eval: Probability::Chance(0.25),
                ..base
            },
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        self.identifier_generator.validate("identifierGenerator")?;
        self.string_concealing.validate("stringConcealing")?;
        self.opaque_predicates.validate("opaquePredicates")?;
        self.eval.validate("eval")?;

        if !self.identifier_generator.is_enabled() {
            return Err(ObfuscateError::InvalidOptions(
                "identifierGenerator must name at least one mode".to_string(),
            ));
        }
        for mode in self.identifier_generator.modes() {
            if !IDENTIFIER_MODES.contains(&mode) {
                return Err(ObfuscateError::InvalidOptions(format!(
                    "identifierGenerator: unknown mode `{mode}`"
                )));
            }
        }
        Ok(())
    }
}
