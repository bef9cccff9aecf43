use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum number of characters after the `10.` prefix.
const MIN_DOI_BODY_CHARS: usize = 8;

/// DOI suffix characters: anything but whitespace, quotes, brackets, braces
/// and a few characters that never appear in real DOIs.
const SUFFIX: &str = r#"[^\s"'<>\[\]{}|\\^`]+"#;

static BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"10\.\d{{4,}}/{SUFFIX}")).unwrap());

static PREFIXED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bdoi\s*:\s*(10\.\d{{4,}}(?:\.\d+)*/{SUFFIX})")).unwrap()
});

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)https?://(?:dx\.)?doi\.org/(10\.\d{{4,}}(?:\.\d+)*/{SUFFIX})"
    ))
    .unwrap()
});

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(?:[a-zA-Z]+|#\d+);").unwrap());

/// Clean a raw DOI match: decode `%2F`, drop HTML entity residue, strip
/// trailing punctuation and unbalanced closing brackets.
///
/// Returns `None` when fewer than 8 characters follow the `10.` prefix.
pub fn clean_doi(raw: &str) -> Option<String> {
    const TRAILING: [char; 7] = ['.', ',', ';', ':', '\'', '"', '>'];

    let decoded = decode_slashes(raw);
    let decoded = ENTITY_RE.replace_all(&decoded, "");
    let mut doi = decoded.trim_end_matches(TRAILING);

    // Strip unbalanced trailing ), ] and }
    loop {
        let unbalanced = [('(', ')'), ('[', ']'), ('{', '}')]
            .into_iter()
            .any(|(open, close)| {
                doi.ends_with(close) && doi.matches(close).count() > doi.matches(open).count()
            });
        if !unbalanced {
            break;
        }
        doi = doi[..doi.len() - 1].trim_end_matches(TRAILING);
    }

    let body = doi.strip_prefix("10.")?;
    (body.chars().count() >= MIN_DOI_BODY_CHARS).then(|| doi.to_string())
}

// URL-encoded slashes show up in copied doi.org links
fn decode_slashes(text: &str) -> String {
    text.replace("%2F", "/").replace("%2f", "/")
}

/// Extract the DOI of a single citation.
///
/// Patterns are tried in order: bare `10.NNNN/...`, `doi:`-prefixed (which
/// also accepts dotted sub-registrants like `10.1000.10/...`), then
/// `doi.org` URLs. The first match that survives [`clean_doi`] wins.
pub fn extract_doi(text: &str) -> Option<String> {
    let text = &decode_slashes(text);
    if let Some(doi) = BARE_RE.find_iter(text).find_map(|m| clean_doi(m.as_str())) {
        return Some(doi);
    }
    [&*PREFIXED_RE, &*URL_RE].into_iter().find_map(|re| {
        re.captures_iter(text)
            .find_map(|caps| caps.get(1).and_then(|m| clean_doi(m.as_str())))
    })
}

/// Every bare DOI in `text`, cleaned and deduplicated case-insensitively in
/// first-seen order. Only DOIs between 11 and 99 characters are kept.
pub fn sweep_dois(text: &str) -> Vec<String> {
    let text = decode_slashes(text);
    let mut seen = HashSet::new();
    BARE_RE
        .find_iter(&text)
        .filter_map(|m| clean_doi(m.as_str()))
        .filter(|doi| (11..100).contains(&doi.chars().count()))
        .filter(|doi| seen.insert(doi.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_period_stripped() {
        assert_eq!(clean_doi("10.1234/abcd.").as_deref(), Some("10.1234/abcd"));
        assert_eq!(
            extract_doi("Smith, J. Title. 10.1234/abcd.").as_deref(),
            Some("10.1234/abcd")
        );
    }

    #[test]
    fn test_balanced_parens_kept() {
        assert_eq!(
            extract_doi("doi 10.1016/0021-9681(87)90171-8.").as_deref(),
            Some("10.1016/0021-9681(87)90171-8")
        );
    }

    #[test]
    fn test_unbalanced_paren_stripped() {
        assert_eq!(
            extract_doi("(see 10.1038/nature12373).").as_deref(),
            Some("10.1038/nature12373")
        );
    }

    #[test]
    fn test_url_form() {
        assert_eq!(
            extract_doi("Available at https://doi.org/10.1145/3292500.3330701, 2019").as_deref(),
            Some("10.1145/3292500.3330701")
        );
    }

    #[test]
    fn test_encoded_slash_decoded() {
        assert_eq!(
            extract_doi("https://doi.org/10.1145%2F3292500.3330701").as_deref(),
            Some("10.1145/3292500.3330701")
        );
    }

    #[test]
    fn test_dotted_registrant_needs_prefix() {
        assert_eq!(
            extract_doi("doi:10.1000.10/abc123xyz").as_deref(),
            Some("10.1000.10/abc123xyz")
        );
        assert_eq!(extract_doi("ref 10.1000.10/abc123xyz"), None);
    }

    #[test]
    fn test_html_entity_removed() {
        assert_eq!(
            extract_doi("10.1002/abcd.1234&gt;").as_deref(),
            Some("10.1002/abcd.1234")
        );
    }

    #[test]
    fn test_too_short_rejected() {
        assert_eq!(clean_doi("10.1234/a"), None);
        assert_eq!(extract_doi("10.1234/ab."), None);
        assert!(clean_doi("10.1234/ab1").is_some());
    }

    #[test]
    fn test_no_doi() {
        assert_eq!(extract_doi("Smith, J. A paper without identifiers. 2020."), None);
    }

    #[test]
    fn test_sweep_dedupes_case_insensitively() {
        let text = "10.1038/Nature12373 and 10.1038/nature12373; also 10.1145/3292500.3330701.";
        assert_eq!(
            sweep_dois(text),
            vec!["10.1038/Nature12373".to_string(), "10.1145/3292500.3330701".to_string()]
        );
    }

    #[test]
    fn test_sweep_length_bounds() {
        let long = format!("10.1234/{}", "x".repeat(100));
        let text = format!("{long} 10.1234/abcdefgh");
        assert_eq!(sweep_dois(&text), vec!["10.1234/abcdefgh".to_string()]);
    }
}
