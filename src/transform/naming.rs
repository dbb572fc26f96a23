//! Name construction for generated identifiers and labels.

use rand::Rng;
use rustc_hash::FxHashSet;

use crate::analysis::is_reserved;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Keywords that `zeroWidth` names are disguised as.
const ZERO_WIDTH_BASES: &[&str] = &[
    "if", "in", "for", "let", "new", "try", "var", "case", "else", "null", "break", "catch",
    "class", "const", "super", "throw", "while", "yield", "delete", "export", "import",
    "public", "return", "switch", "default", "finally", "private", "continue", "debugger",
    "function", "arguments", "protected", "instanceof",
];

const ZERO_WIDTH_NON_JOINER: char = '\u{200C}';

/// Bijective base-52 numbering: `a`..`Z`, then `aa`, `ab`, ...
pub fn alphabetic(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(ALPHABET[index % ALPHABET.len()]);
        if index < ALPHABET.len() {
            break;
        }
        index = index / ALPHABET.len() - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut out = String::with_capacity(len);
    out.push(char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]));
    for _ in 1..len {
        out.push(char::from(ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())]));
    }
    out
}

pub fn hexadecimal<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("_0x{:x}", rng.random_range(0x10_0000..0x100_0000u32))
}

/// A keyword followed by zero-width non-joiners, unique per `index`.
pub fn zero_width(index: usize) -> String {
    let base = ZERO_WIDTH_BASES[index % ZERO_WIDTH_BASES.len()];
    let mut name = base.to_string();
    for _ in 0..=index / ZERO_WIDTH_BASES.len() {
        name.push(ZERO_WIDTH_NON_JOINER);
    }
    name
}

/// Pass-private sequential names (`a`, `b`, ..., `aa`, ...), skipping reserved
/// words and names marked with [`NameGenerator::avoid`].
#[derive(Debug, Default)]
pub struct NameGenerator {
    count: usize,
    avoided: FxHashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never hand out `name`.
    pub fn avoid(&mut self, name: &str) {
        if !self.avoided.contains(name) {
            self.avoided.insert(name.to_string());
        }
    }

    pub fn generate(&mut self) -> String {
        loop {
            let name = alphabetic(self.count);
            self.count += 1;
            if !is_reserved(&name) && !self.avoided.contains(&name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_alphabetic_sequence() {
        assert_eq!(alphabetic(0), "a");
        assert_eq!(alphabetic(25), "z");
        assert_eq!(alphabetic(26), "A");
        assert_eq!(alphabetic(51), "Z");
        assert_eq!(alphabetic(52), "aa");
        assert_eq!(alphabetic(53), "ab");
        assert_eq!(alphabetic(52 + 52 * 52), "aaa");
    }

    #[test]
    fn test_name_generator_skips_keywords() {
        let mut names = NameGenerator::new();
        let generated: Vec<String> = (0..2000).map(|_| names.generate()).collect();
        assert!(!generated.iter().any(|n| n == "do" || n == "if" || n == "in"));
        let unique: std::collections::HashSet<_> = generated.iter().collect();
        assert_eq!(unique.len(), generated.len());
    }

    #[test]
    fn test_name_generator_skips_avoided_names() {
        let mut names = NameGenerator::new();
        names.avoid("a");
        names.avoid("c");
        assert_eq!(names.generate(), "b");
        assert_eq!(names.generate(), "d");
    }

    #[test]
    fn test_zero_width_names_are_distinct() {
        let first = zero_width(0);
        let wrapped = zero_width(ZERO_WIDTH_BASES.len());
        assert!(first.starts_with("if"));
        assert!(wrapped.starts_with("if"));
        assert_ne!(first, wrapped);
        assert!(first.ends_with(ZERO_WIDTH_NON_JOINER));
    }

    #[test]
    fn test_random_names_start_with_letter() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let name = random_string(&mut rng, 8);
            assert_eq!(name.len(), 8);
            assert!(name.chars().next().unwrap().is_ascii_alphabetic());
            assert!(hexadecimal(&mut rng).starts_with("_0x"));
        }
    }
}
