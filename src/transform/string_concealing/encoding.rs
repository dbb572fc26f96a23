//! Base-85 text codec over UTF-16 code units.
//!
//! Pairs of code units form a 32-bit group written as five digits; a trailing
//! single unit is written as three. Digits come from a per-pass shuffled
//! alphabet of characters that need no escaping inside a double-quoted
//! string.

use rand::Rng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;

pub const BASE_ALPHABET: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#%&()*+,-./:;=?@[]^_|~";

const BASE: u32 = 85;
const GROUP: usize = 5;
const TAIL: usize = 3;

#[derive(Debug, Clone)]
pub struct Codec {
    digits: Vec<char>,
    values: FxHashMap<char, u32>,
}

impl Codec {
    pub fn new(alphabet: &str) -> Self {
        let digits: Vec<char> = alphabet.chars().collect();
        let values = digits
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u32))
            .collect();
        Self { digits, values }
    }

    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut digits: Vec<char> = BASE_ALPHABET.chars().collect();
        digits.shuffle(rng);
        Self::new(&digits.into_iter().collect::<String>())
    }

    pub fn alphabet(&self) -> String {
        self.digits.iter().collect()
    }

    fn push_digits(&self, out: &mut String, mut value: u32, width: usize) {
        let mut group = vec!['\0'; width];
        for slot in group.iter_mut().rev() {
            *slot = self.digits[(value % BASE) as usize];
            value /= BASE;
        }
        out.extend(group);
    }

    pub fn encode(&self, value: &str) -> String {
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut out = String::with_capacity(units.len() / 2 * GROUP + TAIL);
        let mut pairs = units.chunks_exact(2);
        for pair in &mut pairs {
            let group = (u32::from(pair[0]) << 16) | u32::from(pair[1]);
            self.push_digits(&mut out, group, GROUP);
        }
        if let [last] = pairs.remainder() {
            self.push_digits(&mut out, u32::from(*last), TAIL);
        }
        out
    }

    fn read_digits(&self, digits: &[char]) -> Option<u64> {
        digits.iter().try_fold(0u64, |acc, c| {
            let digit = self.values.get(c)?;
            Some(acc * u64::from(BASE) + u64::from(*digit))
        })
    }

    /// Inverse of [`Codec::encode`]; `None` for malformed input.
    pub fn decode(&self, encoded: &str) -> Option<String> {
        let chars: Vec<char> = encoded.chars().collect();
        let mut units = Vec::with_capacity(chars.len() / GROUP * 2 + 1);
        let mut groups = chars.chunks_exact(GROUP);
        for group in &mut groups {
            let value = u32::try_from(self.read_digits(group)?).ok()?;
            units.push((value >> 16) as u16);
            units.push((value & 0xFFFF) as u16);
        }
        match groups.remainder() {
            [] => {}
            tail if tail.len() == TAIL => {
                units.push(u16::try_from(self.read_digits(tail)?).ok()?);
            }
            _ => return None,
        }
        String::from_utf16(&units).ok()
    }

    /// Whether `value` survives an encode/decode round trip.
    pub fn round_trips(&self, value: &str) -> bool {
        self.decode(&self.encode(value)).as_deref() == Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_alphabet_is_85_safe_characters() {
        let chars: Vec<char> = BASE_ALPHABET.chars().collect();
        assert_eq!(chars.len(), 85);
        let unique: std::collections::HashSet<_> = chars.iter().collect();
        assert_eq!(unique.len(), 85);
        assert!(!chars.iter().any(|c| matches!(c, '"' | '\'' | '\\' | '`' | '{' | '}')));
    }

    #[test]
    fn test_round_trip() {
        let mut rng = StdRng::seed_from_u64(8);
        let codec = Codec::shuffled(&mut rng);
        for value in [
            "",
            "a",
            "ab",
            "abc",
            "Hello ",
            "line\nbreak\ttab\u{0}",
            "ünïcödé ✓",
            "emoji 😀 pair",
            "\u{FFFF}\u{10FFFF}",
        ] {
            let encoded = codec.encode(value);
            assert_eq!(codec.decode(&encoded).as_deref(), Some(value), "{value:?}");
            assert!(codec.round_trips(value));
            assert!(encoded.chars().all(|c| BASE_ALPHABET.contains(c)));
        }
    }

    #[test]
    fn test_group_lengths() {
        let codec = Codec::new(BASE_ALPHABET);
        assert_eq!(codec.encode("a").len(), 3);
        assert_eq!(codec.encode("ab").len(), 5);
        assert_eq!(codec.encode("abc").len(), 8);
        assert_eq!(codec.encode("a"), "01C");
    }

    #[test]
    fn test_malformed_input() {
        let codec = Codec::new(BASE_ALPHABET);
        assert_eq!(codec.decode("ab"), None);
        assert_eq!(codec.decode("\"\"\"\"\""), None);
        // five digits above u32::MAX
        assert_eq!(codec.decode("~~~~~"), None);
    }

    #[test]
    fn test_shuffles_differ_by_seed() {
        let a = Codec::shuffled(&mut StdRng::seed_from_u64(1)).alphabet();
        let b = Codec::shuffled(&mut StdRng::seed_from_u64(2)).alphabet();
        assert_ne!(a, b);
        assert_eq!(a.len(), 85);
    }
}
