use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;

/// Citations shorter than this (in characters, after cleaning) are dropped.
pub(crate) const MIN_CANDIDATE_CHARS: usize = 10;

const MIN_CITATION_CHARS: usize = 30;
const MAX_CITATION_CHARS: usize = 1000;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace, trim, and truncate to `max_chars` characters.
/// Returns `None` when nothing longer than 10 characters remains.
pub fn clean_candidate(raw: &str, max_chars: usize) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw, " ");
    let trimmed = collapsed.trim();
    let cleaned: String = match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    };
    (cleaned.chars().count() > MIN_CANDIDATE_CHARS).then_some(cleaned)
}

/// Heuristic check that a cleaned candidate is a bibliographic citation.
///
/// Requires a 1900–2099 year token, an author-ish token (an initial with a
/// period or a `Surname,`), a length of 30–1000 characters, and no
/// disqualifying leading word (Theorem, Lemma, Figure, ...).
pub fn looks_like_citation(text: &str) -> bool {
    looks_like_citation_excluding(text, &ParsingConfig::default().excluded_prefixes())
}

/// [`looks_like_citation`] with an already-resolved list of excluded prefixes.
pub(crate) fn looks_like_citation_excluding(text: &str, excluded_prefixes: &[String]) -> bool {
    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}[a-z]?\b").unwrap());
    static AUTHOR_TOKEN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b\p{Lu}\.|\b\p{Lu}[\p{L}'\-]+,").unwrap());

    let len = text.chars().count();
    if !(MIN_CITATION_CHARS..=MAX_CITATION_CHARS).contains(&len) {
        return false;
    }
    if !YEAR_RE.is_match(text) || !AUTHOR_TOKEN_RE.is_match(text) {
        return false;
    }

    let first_word = text
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("");
    !excluded_prefixes
        .iter()
        .any(|prefix| first_word.eq_ignore_ascii_case(prefix))
}
