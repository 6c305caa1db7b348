//! Learned description patterns
//!
//! Confirmed matches teach us that a bank description shape ("transf # acme
//! sa") belongs to a given counterparty. The map only ever feeds a bonus into
//! scoring; it never produces a match on its own.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::fold;

/// Placeholder substituted for every digit run
pub const DIGIT_PLACEHOLDER: &str = "#";

fn digit_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Generalize a description into a pattern key
///
/// Lower case, accents stripped, digit runs replaced by `#`, whitespace
/// collapsed. "TRANSF 000123 Peña" and "transf 991 pena" share a key.
pub fn pattern_key(description: &str) -> String {
    let folded = fold(description);
    let generalized = digit_runs().replace_all(&folded, DIGIT_PLACEHOLDER);
    generalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized description key -> resolved counterparty id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMap {
    entries: HashMap<String, i64>,
}

impl PatternMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `description` resolved to `entity_id` (last write wins)
    pub fn learn(&mut self, description: &str, entity_id: i64) {
        let key = pattern_key(description);
        if key.is_empty() {
            return;
        }
        self.entries.insert(key, entity_id);
    }

    /// Entity previously learned for this description, if any
    pub fn lookup(&self, description: &str) -> Option<i64> {
        self.entries.get(&pattern_key(description)).copied()
    }

    /// Whether `description` was learned to resolve to `entity_id`
    pub fn resolves_to(&self, description: &str, entity_id: i64) -> bool {
        self.lookup(description) == Some(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, i64>> for PatternMap {
    fn from(entries: HashMap<String, i64>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_key_generalizes_digits_and_accents() {
        assert_eq!(pattern_key("TRANSF 000123  Peña SA"), "transf # pena sa");
        assert_eq!(pattern_key("transf 991 pena sa"), "transf # pena sa");
        assert_eq!(pattern_key("Pago Fact 12-3456/7"), "pago fact #-#/#");
    }

    #[test]
    fn test_learn_last_write_wins() {
        let mut map = PatternMap::new();
        map.learn("DEPOSITO CLIENTE 4411", 7);
        map.learn("deposito cliente 9", 8);
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup("DEPOSITO CLIENTE 1234"), Some(8));
        assert!(map.resolves_to("Depósito cliente 55", 8));
        assert!(!map.resolves_to("Depósito cliente 55", 7));
    }

    #[test]
    fn test_blank_descriptions_are_ignored() {
        let mut map = PatternMap::new();
        map.learn("   ", 1);
        assert!(map.is_empty());
        assert_eq!(map.lookup("anything"), None);
    }
}
