use std::collections::HashSet;

use citelint_core::RawCitation;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ParsingConfig;
use crate::text_processing::{clean_candidate, looks_like_citation_excluding};

/// Which splitting strategy produced the citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationStrategy {
    /// `[1]`, `[2]`, ...
    Bracketed,
    /// Line-leading `1.`, `2.`, ...
    Numbered,
    /// Unnumbered `Name, I., et al. (YYYY)` heads.
    EtAl,
    /// Unnumbered `Surname, I. ... (YYYY)` heads.
    AuthorYear,
}

impl SegmentationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bracketed => "bracketed",
            Self::Numbered => "numbered",
            Self::EtAl => "et-al",
            Self::AuthorYear => "author-year",
        }
    }
}

impl std::fmt::Display for SegmentationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of cutting a references section into citation candidates.
pub trait SplitStrategy: Send + Sync {
    fn kind(&self) -> SegmentationStrategy;

    /// Raw, uncleaned pieces in document order, or `None` when the strategy's
    /// marker does not occur at all.
    fn attempt(&self, text: &str) -> Option<Vec<RawCitation>>;
}

/// A marker found in the text: where it starts, where the citation body
/// starts, and the number it declares (if any).
struct Marker {
    start: usize,
    body_start: usize,
    number: Option<u32>,
}

/// Cut the text between consecutive markers. Text before the first marker is ignored.
fn pieces_between(text: &str, markers: &[Marker]) -> Vec<RawCitation> {
    markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(text.len(), |next| next.start);
            let ordinal = marker.number.unwrap_or(i as u32 + 1);
            RawCitation::new(ordinal, &text[marker.body_start..end])
        })
        .collect()
}

/// `[n]` markers; the ordinal is `n`.
pub struct Bracketed;

impl SplitStrategy for Bracketed {
    fn kind(&self) -> SegmentationStrategy {
        SegmentationStrategy::Bracketed
    }

    fn attempt(&self, text: &str) -> Option<Vec<RawCitation>> {
        static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,4})\]").unwrap());

        let markers: Vec<Marker> = RE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Marker {
                    start: whole.start(),
                    body_start: whole.end(),
                    number: caps[1].parse().ok(),
                })
            })
            .collect();
        (!markers.is_empty()).then(|| pieces_between(text, &markers))
    }
}

/// Line-leading `n.` markers (1–3 digits) followed by a capitalized word.
/// A citation continues across lines until the next marker.
pub struct DottedNumbers;

impl SplitStrategy for DottedNumbers {
    fn kind(&self) -> SegmentationStrategy {
        SegmentationStrategy::Numbered
    }

    fn attempt(&self, text: &str) -> Option<Vec<RawCitation>> {
        static RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\d{1,3})\.[ \t]+(\p{Lu})").unwrap());

        let markers: Vec<Marker> = RE
            .captures_iter(text)
            .filter_map(|caps| {
                Some(Marker {
                    start: caps.get(0)?.start(),
                    body_start: caps.get(2)?.start(),
                    number: caps[1].parse().ok(),
                })
            })
            .collect();
        (!markers.is_empty()).then(|| pieces_between(text, &markers))
    }
}

/// Unnumbered `Name, I., et al. (YYYY)` heads; each citation runs from one
/// head to the next. Ordinals are sequential.
pub struct EtAlRuns;

impl SplitStrategy for EtAlRuns {
    fn kind(&self) -> SegmentationStrategy {
        SegmentationStrategy::EtAl
    }

    fn attempt(&self, text: &str) -> Option<Vec<RawCitation>> {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b\p{Lu}[\p{L}'\-]+(?:,?\s+\p{Lu}[\p{L}'\-]*\.?)*,?\s+et\s+al\.?,?\s*\((?:19|20)\d{2}[a-z]?\)",
            )
            .unwrap()
        });
        heads(&RE, text)
    }
}

/// Unnumbered `Surname, I. ... (YYYY)` heads; each citation runs from one
/// head to the next. Ordinals are sequential.
pub struct AuthorYear;

impl SplitStrategy for AuthorYear {
    fn kind(&self) -> SegmentationStrategy {
        SegmentationStrategy::AuthorYear
    }

    fn attempt(&self, text: &str) -> Option<Vec<RawCitation>> {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\p{Lu}[\p{L}'\-]+,\s+(?:\p{Lu}\.\s*)+[^()]{0,300}?\((?:19|20)\d{2}[a-z]?\)",
            )
            .unwrap()
        });
        heads(&RE, text)
    }
}

fn heads(re: &Regex, text: &str) -> Option<Vec<RawCitation>> {
    let markers: Vec<Marker> = re
        .find_iter(text)
        .map(|m| Marker {
            start: m.start(),
            body_start: m.start(),
            number: None,
        })
        .collect();
    (!markers.is_empty()).then(|| pieces_between(text, &markers))
}

/// The accepted split of a references section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub strategy: SegmentationStrategy,
    pub citations: Vec<RawCitation>,
    /// Raw pieces dropped by cleaning or the citation predicate.
    pub dropped: usize,
}

/// Tries each [`SplitStrategy`] in order and keeps the first one whose raw
/// split is large enough.
pub struct CitationSplitter {
    strategies: Vec<Box<dyn SplitStrategy>>,
    min_pieces: usize,
    max_chars: usize,
    excluded_prefixes: Vec<String>,
}

impl Default for CitationSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationSplitter {
    /// Splitter with the built-in strategy order and default thresholds.
    pub fn new() -> Self {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(Bracketed),
                Box::new(DottedNumbers),
                Box::new(EtAlRuns),
                Box::new(AuthorYear),
            ],
            min_pieces: config.min_split_pieces,
            max_chars: config.max_citation_chars,
            excluded_prefixes: config.excluded_prefixes(),
        }
    }

    /// The strategies in the order they are tried.
    pub fn strategies(&self) -> impl Iterator<Item = SegmentationStrategy> + '_ {
        self.strategies.iter().map(|s| s.kind())
    }

    /// Split `text`, or `None` when no strategy yields enough raw pieces.
    pub fn split(&self, text: &str) -> Option<SplitOutcome> {
        let (strategy, raw) = self.strategies.iter().find_map(|s| {
            let pieces = s.attempt(text)?;
            tracing::trace!(strategy = %s.kind(), pieces = pieces.len(), "split attempt");
            (pieces.len() >= self.min_pieces).then(|| (s.kind(), pieces))
        })?;

        let total = raw.len();
        let mut citations: Vec<RawCitation> = raw
            .into_iter()
            .filter_map(|piece| {
                let text = clean_candidate(&piece.text, self.max_chars)?;
                if looks_like_citation_excluding(&text, &self.excluded_prefixes) {
                    Some(RawCitation::new(piece.ordinal, text))
                } else {
                    tracing::trace!(ordinal = piece.ordinal, text = %text, "dropping non-citation");
                    None
                }
            })
            .collect();
        renumber_duplicates(&mut citations);

        tracing::debug!(
            strategy = %strategy,
            kept = citations.len(),
            dropped = total - citations.len(),
            "references split"
        );
        Some(SplitOutcome {
            strategy,
            dropped: total - citations.len(),
            citations,
        })
    }
}

/// Keep the first occurrence of each ordinal; move later duplicates past the
/// highest ordinal.
fn renumber_duplicates(citations: &mut [RawCitation]) {
    let mut next = citations.iter().map(|c| c.ordinal).max().unwrap_or(0);
    let mut seen = HashSet::new();
    for citation in citations.iter_mut() {
        if !seen.insert(citation.ordinal) {
            next += 1;
            citation.ordinal = next;
            seen.insert(next);
        }
    }
}

/// Split a references section into citations with the default strategies.
///
/// An empty result means no citations were found.
pub fn split(text: &str) -> Vec<RawCitation> {
    CitationSplitter::new()
        .split(text)
        .map(|outcome| outcome.citations)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BRACKETED: &str =
        "[1] Smith, J. Title One. (2020).\n[2] Doe, A. Title Two. (2021).\n";

    const BRACKETED: &str = "\
[1] Smith, J. A study of widgets in the wild. Nature 12, 34 (2020).
[2] Doe, A. and Roe, B. Gadgets: a survey of gadgets. Science 5, 6 (2021).
[3] Poe, E. Sprockets considered harmful. In Proc. Sprockets, pp. 1-9, 2019.
";

    #[test]
    fn bracketed_attempt_two_entries() {
        let pieces = Bracketed.attempt(TWO_BRACKETED).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].ordinal, 1);
        assert_eq!(pieces[1].ordinal, 2);
        assert!(pieces[0].text.contains("Title One"));
    }

    #[test]
    fn two_entries_are_below_threshold() {
        assert!(split(TWO_BRACKETED).is_empty());
    }

    #[test]
    fn bracketed_split() {
        let outcome = CitationSplitter::new().split(BRACKETED).unwrap();
        assert_eq!(outcome.strategy, SegmentationStrategy::Bracketed);
        let ordinals: Vec<_> = outcome.citations.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(
            outcome.citations[0].text,
            "Smith, J. A study of widgets in the wild. Nature 12, 34 (2020)."
        );
    }

    #[test]
    fn missing_marker_is_none() {
        assert!(Bracketed.attempt("no markers here").is_none());
        assert!(DottedNumbers.attempt("no markers here").is_none());
    }

    #[test]
    fn dotted_numbers_span_lines() {
        let text = "\
1. Smith, J. A first paper about widgets.
   Nature 12, 34 (2020).
2. Doe, A. A second paper on gadgets.
   Science 5, 6 (2021).
3. Roe, B. A third paper on sprockets.
   Cell 7, 8 (2019).
";
        let outcome = CitationSplitter::new().split(text).unwrap();
        assert_eq!(outcome.strategy, SegmentationStrategy::Numbered);
        assert_eq!(outcome.citations.len(), 3);
        assert_eq!(
            outcome.citations[1].text,
            "Doe, A. A second paper on gadgets. Science 5, 6 (2021)."
        );
        assert_eq!(outcome.citations[2].ordinal, 3);
    }

    #[test]
    fn et_al_heads() {
        let text = "\
Smith, J., Jones, K., et al. (2019) Deep widgets for everyone. Nature 567, 12-15.
Brown, A., et al. (2020) Another widget study here. Science 368, 100-105.
Green, P., White, Q., et al. (2021) Yet more widget results. Cell 184, 1-10.
";
        let outcome = CitationSplitter::new().split(text).unwrap();
        assert_eq!(outcome.strategy, SegmentationStrategy::EtAl);
        let ordinals: Vec<_> = outcome.citations.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert!(outcome.citations[1].text.starts_with("Brown, A., et al. (2020)"));
    }

    #[test]
    fn author_year_heads() {
        let text = "\
Smith, J. A., & Doe, B. (2019). Widgets in the wild. Journal of Widgets, 12, 34-56.
Brown, C. (2020). Gadgets and more gadgets. Gadget Review, 3, 1-9.
Green, D., White, E. (2021). Sprockets explained at length. Sprocket Letters, 7, 100-110.
";
        let outcome = CitationSplitter::new().split(text).unwrap();
        assert_eq!(outcome.strategy, SegmentationStrategy::AuthorYear);
        assert_eq!(outcome.citations.len(), 3);
        assert!(outcome.citations[2].text.starts_with("Green, D."));
        assert!(outcome.citations[0].text.ends_with("34-56."));
    }

    #[test]
    fn predicate_drops_non_citations() {
        let text = format!("{BRACKETED}[4] Table 2: accuracy of Smith, J. on 2020 data, all runs.\n[5] short\n");
        let outcome = CitationSplitter::new().split(&text).unwrap();
        assert_eq!(outcome.citations.len(), 3);
        assert_eq!(outcome.dropped, 2);
    }

    #[test]
    fn duplicate_ordinals_are_renumbered() {
        let text = "\
[1] Smith, J. A study of widgets in the wild. Nature 12, 34 (2020).
[2] Doe, A. Gadgets: a survey of gadgets. Science 5, 6 (2021).
[2] Roe, B. Gizmos and their many uses. Cell 1, 2 (2018).
[3] Poe, E. Sprockets considered harmful. Nature 9, 10 (2019).
";
        let ordinals: Vec<_> = split(text).iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 4, 3]);
    }

    #[test]
    fn candidates_are_bounded() {
        let long_title = "very long title words ".repeat(40);
        let text = format!(
            "{BRACKETED}[4] Long, A. {long_title} Nature 1, 2 (2020).\n"
        );
        for citation in split(&text) {
            let len = citation.text.chars().count();
            assert!(len > 10 && len <= 500, "bad length {len}");
        }
    }

    #[test]
    fn split_is_idempotent() {
        assert_eq!(split(BRACKETED), split(BRACKETED));
    }
}
