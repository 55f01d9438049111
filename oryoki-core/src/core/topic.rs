//! Topic labels and their case-normalisation rules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
}

/// Normalises a user-typed topic name: control characters removed, trimmed,
/// first character upper-cased, the remainder lower-cased.
///
/// ```rust
/// use oryoki_core::normalize_topic_name;
///
/// assert_eq!(normalize_topic_name("  billing "), "Billing");
/// assert_eq!(normalize_topic_name("SHIPPING"), "Shipping");
/// ```
pub fn normalize_topic_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    let mut chars = cleaned.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Normalises a list of topic names and drops blanks and case-insensitive duplicates.
///
/// The first spelling wins; the result is sorted by name.
pub fn normalize_topic_list(names: &[String]) -> Vec<String> {
    let mut normalised: Vec<String> = names
        .iter()
        .map(|n| normalize_topic_name(n))
        .filter(|n| !n.is_empty())
        .collect();
    normalised.sort();
    normalised.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
    normalised
}
