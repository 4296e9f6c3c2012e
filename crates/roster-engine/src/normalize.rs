//! Name normalization into comparable token sets and dedup keys.

use std::collections::BTreeSet;

/// Lower-cased word tokens of a name; `.` and `-` split words, one-character
/// tokens are dropped.
pub type NameTokenSet = BTreeSet<String>;

pub fn normalize_name(text: &str) -> NameTokenSet {
    text.to_lowercase()
        .replace(['.', '-'], " ")
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Number of tokens two sets have in common.
pub fn shared_token_count(left: &NameTokenSet, right: &NameTokenSet) -> usize {
    left.intersection(right).count()
}

/// Dedup key for statistics: the first three words of the lower-cased name
/// with punctuation removed. Coarser than the resolver's overlap test.
pub fn person_key(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
        .collect();
    stripped.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}
