//! Display-name normalisation applied at signup and profile updates.

use std::collections::HashSet;

/// Normalise a full name.
///
/// Words are split on whitespace, repeated words are dropped
/// case-insensitively (first occurrence wins), and every remaining word is
/// capitalised: `"ali  ALI khan"` becomes `"Ali Khan"`.
pub fn clean_full_name(full_name: &str) -> String {
    let mut seen = HashSet::new();
    full_name
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| seen.insert(word.clone()))
        .map(|word| capitalise(&word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a cleaned name into `(first_name, last_name)`.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut words = full_name.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let last = words.collect::<Vec<_>>().join(" ");
    (first, last)
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
