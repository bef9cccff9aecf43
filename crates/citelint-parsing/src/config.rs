use citelint_core::config_file::ParsingSection;
use regex::Regex;

/// Controls how a list of values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Candidates starting with one of these words are not citations.
pub(crate) const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "Theorem",
    "Lemma",
    "Proof",
    "Definition",
    "Appendix",
    "Figure",
    "Table",
];

pub(crate) const DEFAULT_FALLBACK_FRACTION: f64 = 0.6;
pub(crate) const DEFAULT_MAX_CITATION_CHARS: usize = 500;
pub(crate) const DEFAULT_MIN_SPLIT_PIECES: usize = 3;

/// Configuration for the extraction pipeline.
///
/// Regex fields are `Option<Regex>`: `None` means "use the built-in default".
/// Use [`ParsingConfigBuilder`] to construct with string patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    // ── section.rs ──
    /// Regex to locate the references section header.
    pub(crate) section_header_re: Option<Regex>,
    /// Regex to find end markers (Appendix, Acknowledgments, etc.).
    pub(crate) section_end_re: Option<Regex>,
    /// Where the tail fallback starts, as a fraction of the document (0.0–1.0).
    pub(crate) fallback_fraction: f64,

    // ── splitter.rs ──
    /// A strategy must yield at least this many raw pieces to be accepted.
    pub(crate) min_split_pieces: usize,
    /// Cleaned candidates are truncated to this many characters.
    pub(crate) max_citation_chars: usize,

    // ── text_processing.rs ──
    /// Leading words that disqualify a candidate.
    pub(crate) excluded_prefixes: ListOverride<String>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            section_header_re: None,
            section_end_re: None,
            fallback_fraction: DEFAULT_FALLBACK_FRACTION,
            min_split_pieces: DEFAULT_MIN_SPLIT_PIECES,
            max_citation_chars: DEFAULT_MAX_CITATION_CHARS,
            excluded_prefixes: ListOverride::Default,
        }
    }
}

impl ParsingConfig {
    /// The resolved list of disqualifying leading words.
    pub fn excluded_prefixes(&self) -> Vec<String> {
        let defaults: Vec<String> = DEFAULT_EXCLUDED_PREFIXES
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.excluded_prefixes.resolve(&defaults)
    }

    pub fn fallback_fraction(&self) -> f64 {
        self.fallback_fraction
    }
}

/// Builder for [`ParsingConfig`].
///
/// Accepts string patterns that are compiled to `Regex` in [`build()`](Self::build).
/// Fails fast with `regex::Error` if any pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    section_header_re: Option<String>,
    section_end_re: Option<String>,
    fallback_fraction: Option<f64>,
    min_split_pieces: Option<usize>,
    max_citation_chars: Option<usize>,
    excluded_prefixes: ListOverride<String>,
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Section header / end ──

    pub fn section_header_regex(mut self, pattern: &str) -> Self {
        self.section_header_re = Some(pattern.to_string());
        self
    }

    pub fn section_end_regex(mut self, pattern: &str) -> Self {
        self.section_end_re = Some(pattern.to_string());
        self
    }

    pub fn fallback_fraction(mut self, fraction: f64) -> Self {
        self.fallback_fraction = Some(fraction);
        self
    }

    // ── Splitting ──

    pub fn min_split_pieces(mut self, n: usize) -> Self {
        self.min_split_pieces = Some(n);
        self
    }

    pub fn max_citation_chars(mut self, n: usize) -> Self {
        self.max_citation_chars = Some(n);
        self
    }

    // ── Excluded prefixes ──

    pub fn set_excluded_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.excluded_prefixes = ListOverride::Replace(prefixes);
        self
    }

    pub fn add_excluded_prefix(mut self, prefix: String) -> Self {
        match &mut self.excluded_prefixes {
            ListOverride::Extend(v) => v.push(prefix),
            _ => self.excluded_prefixes = ListOverride::Extend(vec![prefix]),
        }
        self
    }

    /// Take overrides from the `[parsing]` table of a config file.
    /// Excluded prefixes listed there extend the defaults.
    pub fn with_file_section(mut self, section: &ParsingSection) -> Self {
        if let Some(p) = &section.section_header_regex {
            self = self.section_header_regex(p);
        }
        if let Some(p) = &section.section_end_regex {
            self = self.section_end_regex(p);
        }
        if let Some(f) = section.fallback_fraction {
            self = self.fallback_fraction(f);
        }
        for prefix in section.excluded_prefixes.iter().flatten() {
            self = self.add_excluded_prefix(prefix.clone());
        }
        self
    }

    /// Compile all string patterns into regexes and produce a [`ParsingConfig`].
    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let compile = |opt: Option<String>| -> Result<Option<Regex>, regex::Error> {
            opt.map(|p| Regex::new(&p)).transpose()
        };

        Ok(ParsingConfig {
            section_header_re: compile(self.section_header_re)?,
            section_end_re: compile(self.section_end_re)?,
            fallback_fraction: self
                .fallback_fraction
                .unwrap_or(DEFAULT_FALLBACK_FRACTION)
                .clamp(0.0, 1.0),
            min_split_pieces: self
                .min_split_pieces
                .unwrap_or(DEFAULT_MIN_SPLIT_PIECES)
                .max(1),
            max_citation_chars: self
                .max_citation_chars
                .unwrap_or(DEFAULT_MAX_CITATION_CHARS),
            excluded_prefixes: self.excluded_prefixes,
        })
    }
}
