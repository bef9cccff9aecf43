//! Lexical title similarity.

use std::collections::HashSet;

/// Jaccard similarity of the word sets of `a` and `b`, in `[0, 1]`.
///
/// Both strings are lowercased and split on whitespace; tokens of two
/// characters or fewer are discarded. Punctuation stays attached to its
/// token. Returns 0 when neither string has a usable token.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    shared as f64 / union as f64
}

fn tokens(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}
