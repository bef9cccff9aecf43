use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;

/// How the references section was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    /// A "References"-style header line.
    Header,
    /// A `1. Capitalized` line in the second half of the document.
    NumberedList,
    /// No marker at all: the tail of the document.
    Tail,
}

/// The located references section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSection {
    pub text: String,
    pub source: SectionSource,
}

/// Header lines: an optional section number, the header word(s), an optional
/// colon, nothing else on the line.
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:[0-9IVX]+\.?[ \t]+)?(?:References?|Bibliography|Works[ \t]+Cited|Literature[ \t]+Cited|Cited[ \t]+References)[ \t]*:?[ \t]*\r?$",
    )
    .unwrap()
});

static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:\d{1,2}\.?[ \t]+|[A-Z]\.?[ \t]+)?(?i:Appendix|Appendices|Further[ \t]+reading|Supplementary|Acknowledge?ments?|Author[ \t]+contributions|Data[ \t]+availability|Conflicts?[ \t]+of[ \t]+interests?|Extended[ \t]+Data)\b",
    )
    .unwrap()
});

static NUMBERED_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*1\.[ \t]+\p{Lu}").unwrap());

/// End markers are only searched this many characters past the section start.
const END_MARKER_GRACE_CHARS: usize = 100;

/// Locate the references section in the document text.
///
/// Returns a non-empty string whenever `text` is non-empty.
pub fn locate(text: &str) -> String {
    locate_with_config(text, &ParsingConfig::default()).text
}

/// Config-aware version of [`locate`] that also reports how the section was found.
///
/// Priority is header line, then a numbered list starting past the middle of
/// the document, then the tail of the document. The first two are cut at the
/// first end marker (Appendix, Acknowledgments, ...); the tail is returned whole.
pub fn locate_with_config(text: &str, config: &ParsingConfig) -> LocatedSection {
    if let Some(start) = header_start(text, config) {
        let section = truncate_at_end_marker(&text[start..], config);
        if !section.trim().is_empty() {
            return LocatedSection {
                text: section.to_string(),
                source: SectionSource::Header,
            };
        }
    }

    let midpoint = text.len() / 2;
    if let Some(m) = NUMBERED_START_RE
        .find_iter(text)
        .find(|m| m.start() > midpoint)
    {
        let section = truncate_at_end_marker(&text[m.start()..], config);
        return LocatedSection {
            text: section.to_string(),
            source: SectionSource::NumberedList,
        };
    }

    let cutoff = (text.len() as f64 * config.fallback_fraction) as usize;
    let cutoff = char_boundary_at_or_after(text, cutoff);
    tracing::debug!(cutoff, len = text.len(), "no references header, using document tail");
    LocatedSection {
        text: text[cutoff..].to_string(),
        source: SectionSource::Tail,
    }
}

/// Byte offset just past the header line, for the earliest header in the text.
fn header_start(text: &str, config: &ParsingConfig) -> Option<usize> {
    let header_re = config.section_header_re.as_ref().unwrap_or(&HEADER_RE);
    let m = header_re.find(text)?;
    let rest = &text[m.end()..];
    Some(match rest.find('\n') {
        Some(nl) => m.end() + nl + 1,
        None => text.len(),
    })
}

fn truncate_at_end_marker<'a>(section: &'a str, config: &ParsingConfig) -> &'a str {
    let end_re = config.section_end_re.as_ref().unwrap_or(&END_RE);
    let skip = section
        .char_indices()
        .nth(END_MARKER_GRACE_CHARS)
        .map(|(i, _)| i);
    let Some(skip) = skip else {
        return section;
    };
    match end_re.find_at(section, skip) {
        Some(end) => &section[..end.start()],
        None => section,
    }
}

// Don't split in the middle of a UTF-8 codepoint
fn char_boundary_at_or_after(text: &str, offset: usize) -> usize {
    if offset >= text.len() {
        return text.char_indices().last().map(|(i, _)| i).unwrap_or(0);
    }
    (offset..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "Body text of the paper goes on here. ".repeat(n)
    }

    #[test]
    fn header_section_starts_after_header_line() {
        let text = format!(
            "{}\nReferences\n[1] Smith, J. A paper. (2020).\n[2] Doe, A. Another. (2021).\n",
            filler(5)
        );
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_eq!(found.source, SectionSource::Header);
        assert!(found.text.starts_with("[1] Smith"));
    }

    #[test]
    fn earliest_header_wins() {
        let text = format!(
            "{}\nBibliography\nfirst block\n{}\nReferences\nsecond block\n",
            filler(2),
            filler(2)
        );
        let section = locate(&text);
        assert!(section.starts_with("first block"));
    }

    #[test]
    fn numbered_header_is_recognized() {
        let text = format!("{}\n7. REFERENCES\n1. Smith, J. Title. (2020).\n", filler(3));
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_eq!(found.source, SectionSource::Header);
        assert!(found.text.starts_with("1. Smith"));
    }

    #[test]
    fn singular_header_is_recognized() {
        let text = format!("{}\nREFERENCE\n[1] Smith, J. Title. (2020).\n", filler(3));
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_eq!(found.source, SectionSource::Header);
        assert!(found.text.starts_with("[1] Smith"));
    }

    #[test]
    fn inline_mention_is_not_a_header() {
        let text = format!("References to earlier work abound.\n{}", filler(10));
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_ne!(found.source, SectionSource::Header);
    }

    #[test]
    fn end_marker_truncates_after_grace() {
        let refs = "[1] Smith, J. A rather long paper title about many things. Nature 1, 2 (2020).\n\
                    [2] Doe, A. Another long paper title. Science 3, 4 (2021).\n";
        let text = format!("{}\nReferences\n{}Acknowledgments\nWe thank everyone.\n", filler(3), refs);
        let section = locate(&text);
        assert_eq!(section, refs);
    }

    #[test]
    fn end_marker_within_grace_is_ignored() {
        let text = format!(
            "{}\nReferences\nAppendix style journal name. 2020.\n{}",
            filler(1),
            "x".repeat(150)
        );
        let section = locate(&text);
        assert!(section.starts_with("Appendix style"));
        assert!(section.ends_with('x'));
    }

    #[test]
    fn numbered_list_in_second_half() {
        let text = format!(
            "1. Introduction\n{}\n1. Smith, J. First paper. (2020).\n2. Doe, A. Second. (2021).\n",
            filler(10)
        );
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_eq!(found.source, SectionSource::NumberedList);
        assert!(found.text.starts_with("1. Smith"));
    }

    #[test]
    fn tail_fallback_is_at_least_forty_percent() {
        let text = filler(40);
        let found = locate_with_config(&text, &ParsingConfig::default());
        assert_eq!(found.source, SectionSource::Tail);
        assert!(!found.text.is_empty());
        assert!(found.text.len() * 10 >= text.len() * 4);
        assert!(text.ends_with(&found.text));
    }

    #[test]
    fn tail_fallback_respects_char_boundaries() {
        let text = "é".repeat(101);
        let section = locate(&text);
        assert!(!section.is_empty());
        assert!(section.chars().all(|c| c == 'é'));
    }

    #[test]
    fn tiny_input_is_non_empty() {
        assert_eq!(locate("x"), "x");
        assert_eq!(locate(""), "");
    }

    #[test]
    fn custom_header_regex() {
        let config = crate::ParsingConfigBuilder::new()
            .section_header_regex(r"(?m)^Literatur$")
            .build()
            .unwrap();
        let text = format!("{}\nLiteratur\nMüller, K. (2019). Titel.\n", filler(3));
        let found = locate_with_config(&text, &config);
        assert_eq!(found.source, SectionSource::Header);
        assert!(found.text.starts_with("Müller"));
    }
}
