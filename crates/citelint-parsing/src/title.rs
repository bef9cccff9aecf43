use once_cell::sync::Lazy;
use regex::Regex;

const MIN_TITLE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 300;
const MIN_FALLBACK_CHARS: usize = 15;
const MAX_FALLBACK_CHARS: usize = 200;

/// Extract the title of a cleaned citation.
///
/// Strategies, first plausible candidate wins:
/// 1. A quoted span (straight or curly quotes)
/// 2. The sentence after "et al." (skipping a parenthesized year)
/// 3. The sentence after an author initial ("J. Title.")
/// 4. The sentence after "(YYYY)."
/// 5. The sentence right before a journal marker (Nature, Proc., In ...)
/// 6. The sentence after "in:" / "In "
///
/// Falls back to the first sentence that is not an author list ("Smith, J."
/// or Vancouver "Smith J,"), a
/// volume/page fragment, or a journal abbreviation chain.
pub fn extract_title(text: &str) -> Option<String> {
    let strategies: [fn(&str) -> Option<String>; 6] = [
        quoted,
        after_et_al,
        after_initial,
        after_year,
        before_journal,
        after_in,
    ];
    strategies
        .iter()
        .find_map(|strategy| strategy(text))
        .or_else(|| first_plausible_sentence(text))
}

fn tidy(candidate: &str) -> String {
    candidate
        .trim()
        .trim_end_matches([',', '.', ';', ':'])
        .trim()
        .to_string()
}

/// First capture of `re` in `text` that looks like a title.
fn first_title_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| tidy(m.as_str())))
        .find(|candidate| looks_like_title(candidate))
}

fn quoted(text: &str) -> Option<String> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"["“]([^"“”]{10,200})["”]"#).unwrap());
    first_title_capture(&RE, text)
}

fn after_et_al(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"et\s+al\.?,?\s*(?:\((?:19|20)\d{2}[a-z]?\)[.,:]?\s*)?([^.]+)\.").unwrap()
    });
    first_title_capture(&RE, text)
}

fn after_initial(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}\.\s+(\p{Lu}[^.]+)\.").unwrap());
    // "J. In: Proceedings of ..." is a venue marker, left to `after_in`
    static VENUE_MARKER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:[Ii]n:|In\s+\p{Lu})").unwrap());
    RE.captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| tidy(m.as_str())))
        .find(|candidate| !VENUE_MARKER_RE.is_match(candidate) && looks_like_title(candidate))
}

fn after_year(text: &str) -> Option<String> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\((?:19|20)\d{2}[a-z]?\)\.?\s*([^.]+)\.").unwrap());
    first_title_capture(&RE, text)
}

fn before_journal(text: &str) -> Option<String> {
    static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\.\s+(?:Nature\b|Science\b|Cell\b|J\.|Proc\.|In\s)").unwrap()
    });
    MARKER_RE.find_iter(text).find_map(|m| {
        let before = &text[..m.start()];
        let sentence = SENTENCE_END_RE.split(before).last()?;
        let candidate = tidy(sentence);
        looks_like_title(&candidate).then_some(candidate)
    })
}

fn after_in(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\b[Ii]n:|\bIn\s)\s*([^.]+)\.").unwrap());
    first_title_capture(&RE, text)
}

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+").unwrap());

static AUTHOR_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\p{Lu}[\p{L}'\-]+,\s+\p{Lu}(?:\.|\b)|(?:\p{Lu}\.\s*)+\p{Lu}[\p{L}'\-]+(?:,|\s+and\b|\s*$))")
        .unwrap()
});

/// Titles are mostly letters, at least two words, and not an author list.
pub fn looks_like_title(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) {
        return false;
    }

    let non_space = candidate.chars().filter(|c| !c.is_whitespace()).count();
    let letters = candidate.chars().filter(|c| c.is_alphabetic()).count();
    if letters * 2 < non_space {
        return false;
    }

    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.len() < 2 {
        return false;
    }

    !looks_like_author_list(candidate, &words)
}

fn looks_like_author_list(candidate: &str, words: &[&str]) -> bool {
    if AUTHOR_LIST_RE.is_match(candidate) || candidate.contains(" et al") {
        return true;
    }
    // A dangling initial means the match stopped inside a name list
    words.last().is_some_and(|w| {
        let mut chars = w.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
    })
}

fn first_plausible_sentence(text: &str) -> Option<String> {
    static AUTHOR_SHAPE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\p{Lu}[\p{L}'\-]+(?:,\s+\p{Lu}\b|\s+\p{Lu}{1,3},)").unwrap());
    static VOLUME_PAGE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[\d\s,:;()\-–]+$|^\d{1,4}\s*[,:(]\s*\d+").unwrap());
    static JOURNAL_CHAIN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:\p{Lu}[a-z]{0,9}\.\s*){2,}").unwrap());

    let mut start = 0;
    let mut sentences = Vec::new();
    for m in SENTENCE_END_RE.find_iter(text) {
        // Keep the period so abbreviation chains stay recognizable
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences.into_iter().find_map(|sentence| {
        let sentence = sentence.trim();
        if AUTHOR_SHAPE_RE.is_match(sentence)
            || VOLUME_PAGE_RE.is_match(sentence)
            || JOURNAL_CHAIN_RE.is_match(sentence)
        {
            return None;
        }
        let candidate = tidy(sentence);
        let len = candidate.chars().count();
        ((MIN_FALLBACK_CHARS..=MAX_FALLBACK_CHARS).contains(&len)
            && candidate.chars().any(char::is_alphabetic))
        .then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_straight() {
        assert_eq!(
            extract_title(r#"J. Smith and A. Doe, "Widgets in the wild," in Proc. IEEE, 2020."#)
                .as_deref(),
            Some("Widgets in the wild")
        );
    }

    #[test]
    fn test_quoted_curly() {
        assert_eq!(
            extract_title("J. Smith, “Gadgets considered harmful,” Nature, 2019.").as_deref(),
            Some("Gadgets considered harmful")
        );
    }

    #[test]
    fn test_after_et_al() {
        assert_eq!(
            extract_title(
                "Smith, J., Jones, K., et al. (2019) Deep widgets for everyone. Nature 567, 12-15."
            )
            .as_deref(),
            Some("Deep widgets for everyone")
        );
    }

    #[test]
    fn test_after_initial() {
        assert_eq!(
            extract_title("Smith, J. A study of widgets in the wild. Nature 12, 34 (2020).")
                .as_deref(),
            Some("A study of widgets in the wild")
        );
    }

    #[test]
    fn test_after_initial_skips_author_run() {
        assert_eq!(
            extract_title("Doe, A. and Roe, B. Gadgets: a survey of gadgets. Science 5, 6 (2021).")
                .as_deref(),
            Some("Gadgets: a survey of gadgets")
        );
    }

    #[test]
    fn test_after_initial_skips_proceedings_marker() {
        assert_eq!(
            after_initial("Smith, J. In: Proceedings of the widget conference on gadgets. 2020."),
            None
        );
        assert_eq!(
            extract_title("Smith, J. Widgets at scale. In: Proceedings of the widget conference. 2020.")
                .as_deref(),
            Some("Widgets at scale")
        );
    }

    #[test]
    fn test_after_in() {
        assert_eq!(
            extract_title("Widget Consortium in: Handbook of gadget engineering. Springer, 2020.")
                .as_deref(),
            Some("Handbook of gadget engineering")
        );
        assert_eq!(
            extract_title("Smith, J. In: Proceedings of the widget conference on gadgets. 2020.")
                .as_deref(),
            Some("Proceedings of the widget conference on gadgets")
        );
    }

    #[test]
    fn test_fallback_skips_vancouver_authors() {
        assert_eq!(
            extract_title(
                "Smith J, Doe A, Roe B 2019 widgets and gadgets. Widget theory for the modern practitioner. 2018."
            )
            .as_deref(),
            Some("Widget theory for the modern practitioner")
        );
        assert_eq!(extract_title("Smith J, Doe A (2019) widgets, gadgets, and more"), None);
    }

    #[test]
    fn test_after_year() {
        assert_eq!(
            extract_title("Brown, C. (2020). Gadgets and more gadgets. Gadget Review, 3, 1-9.")
                .as_deref(),
            Some("Gadgets and more gadgets")
        );
    }

    #[test]
    fn test_before_journal_marker() {
        assert_eq!(
            extract_title(
                "J. Smith and A. Doe. Widgets revisited in depth. In Proc. Widgets, 2019."
            )
            .as_deref(),
            Some("Widgets revisited in depth")
        );
    }

    #[test]
    fn test_fallback_sentence() {
        assert_eq!(
            extract_title("Widget theory for the modern practitioner. Springer, Berlin, 2018.")
                .as_deref(),
            Some("Widget theory for the modern practitioner")
        );
    }

    #[test]
    fn test_nothing_plausible() {
        assert_eq!(extract_title("Smith, J. 2020."), None);
    }

    #[test]
    fn test_looks_like_title() {
        assert!(looks_like_title("Attention is all you need"));
        assert!(!looks_like_title("Short"));
        assert!(!looks_like_title("Smith, J. and Doe, A"));
        assert!(!looks_like_title("J. Smith, A. Doe"));
        assert!(!looks_like_title("123 456 789 1011"));
        assert!(!looks_like_title("Smith and Jones and A"));
    }
}
