use citelint_core::{Citation, ExtractedFields, RawCitation};

use crate::config::ParsingConfig;
use crate::section::{self, LocatedSection, SectionSource};
use crate::splitter::{CitationSplitter, SegmentationStrategy, SplitOutcome};
use crate::{ParsingError, fields, identifiers};

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Citations in document order, followed by DOI-only citations for
    /// identifiers found outside any split citation.
    pub citations: Vec<Citation>,
    /// Every DOI found anywhere in the document.
    pub document_dois: Vec<String>,
    /// The accepted split strategy, if any strategy was accepted.
    pub strategy: Option<SegmentationStrategy>,
    pub section_source: SectionSource,
    /// Raw candidates dropped by cleaning or the citation predicate.
    pub dropped: usize,
}

impl ExtractionResult {
    /// Citations that came only from the document-wide DOI sweep.
    pub fn doi_only_count(&self) -> usize {
        self.citations
            .iter()
            .filter(|c| c.raw.text.starts_with(DOI_ONLY_PREFIX))
            .count()
    }
}

const DOI_ONLY_PREFIX: &str = "DOI: ";

/// A configurable citation extraction pipeline.
///
/// Holds a [`ParsingConfig`] and exposes each pipeline step as a method.
pub struct CitationExtractor {
    config: ParsingConfig,
    splitter: CitationSplitter,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationExtractor {
    /// Create an extractor with default configuration.
    pub fn new() -> Self {
        Self::with_config(ParsingConfig::default())
    }

    /// Create an extractor with a custom configuration.
    pub fn with_config(config: ParsingConfig) -> Self {
        let splitter = CitationSplitter::with_config(&config);
        Self { config, splitter }
    }

    pub fn config(&self) -> &ParsingConfig {
        &self.config
    }

    /// Locate the references section (step 1).
    pub fn locate_section(&self, text: &str) -> LocatedSection {
        section::locate_with_config(text, &self.config)
    }

    /// Split a references section into citations (step 2).
    pub fn split(&self, section: &str) -> Option<SplitOutcome> {
        self.splitter.split(section)
    }

    /// Extract identifying fields from one citation (step 3).
    pub fn extract_fields(&self, citation: &str) -> ExtractedFields {
        fields::extract_fields(citation)
    }

    /// Run the full pipeline on the text of a document.
    pub fn extract(&self, text: &str) -> Result<ExtractionResult, ParsingError> {
        if text.trim().is_empty() {
            return Err(ParsingError::EmptyDocument);
        }

        let section = self.locate_section(text);
        let (strategy, raw, dropped) = match self.split(&section.text) {
            Some(outcome) => (Some(outcome.strategy), outcome.citations, outcome.dropped),
            None => (None, Vec::new(), 0),
        };

        let mut citations: Vec<Citation> = raw
            .into_iter()
            .map(|raw| {
                let fields = self.extract_fields(&raw.text);
                Citation { raw, fields }
            })
            .collect();

        let document_dois = identifiers::sweep_dois(text);
        attach_document_dois(&mut citations, &document_dois);

        if citations.is_empty() {
            return Err(ParsingError::NoCitations);
        }

        tracing::info!(
            citations = citations.len(),
            dois = document_dois.len(),
            strategy = strategy.map(|s| s.as_str()).unwrap_or("none"),
            section = ?section.source,
            "citations extracted"
        );

        Ok(ExtractionResult {
            citations,
            document_dois,
            strategy,
            section_source: section.source,
            dropped,
        })
    }
}

/// Give citations without a DOI the sweep DOI their text contains, and append
/// a DOI-only citation for every sweep DOI no citation accounts for.
fn attach_document_dois(citations: &mut Vec<Citation>, document_dois: &[String]) {
    let split_count = citations.len();
    let mut next_ordinal = citations.iter().map(|c| c.raw.ordinal).max().unwrap_or(0);
    let lowered: Vec<String> = citations
        .iter()
        .map(|c| c.raw.text.to_lowercase())
        .collect();

    for doi in document_dois {
        let needle = doi.to_lowercase();
        let mut claimed = false;

        for (citation, text) in citations[..split_count].iter_mut().zip(&lowered) {
            let own = citation.fields.doi.as_deref().map(str::to_lowercase);
            if own.as_deref() == Some(needle.as_str()) {
                claimed = true;
            } else if text.contains(&needle) {
                claimed = true;
                if citation.fields.doi.is_none() {
                    tracing::debug!(
                        ordinal = citation.raw.ordinal,
                        doi = %doi,
                        "attaching document DOI"
                    );
                    citation.fields.doi = Some(doi.clone());
                }
            }
        }

        if !claimed {
            next_ordinal += 1;
            citations.push(Citation {
                raw: RawCitation::new(next_ordinal, format!("{DOI_ONLY_PREFIX}{doi}")),
                fields: ExtractedFields {
                    doi: Some(doi.clone()),
                    ..Default::default()
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(ordinal: u32, text: &str, doi: Option<&str>) -> Citation {
        Citation {
            raw: RawCitation::new(ordinal, text),
            fields: ExtractedFields {
                doi: doi.map(String::from),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_attach_fills_missing_doi() {
        let mut citations = vec![citation(
            1,
            "Smith, J. Widgets. doi.org/10.1038/NATURE12373 (2020)",
            None,
        )];
        attach_document_dois(&mut citations, &["10.1038/nature12373".to_string()]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].fields.doi.as_deref(), Some("10.1038/nature12373"));
    }

    #[test]
    fn test_attach_keeps_own_doi() {
        let mut citations = vec![citation(
            4,
            "Smith, J. Widgets. 10.1038/nature12373 (2020)",
            Some("10.1038/nature12373"),
        )];
        attach_document_dois(&mut citations, &["10.1038/Nature12373".to_string()]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].fields.doi.as_deref(), Some("10.1038/nature12373"));
    }

    #[test]
    fn test_unclaimed_dois_become_citations() {
        let mut citations = vec![
            citation(3, "Smith, J. Widgets (2020)", None),
            citation(7, "Doe, A. Gadgets (2021)", None),
        ];
        attach_document_dois(
            &mut citations,
            &["10.1234/orphan.one".to_string(), "10.1234/orphan.two".to_string()],
        );
        assert_eq!(citations.len(), 4);
        assert_eq!(citations[2].raw.ordinal, 8);
        assert_eq!(citations[3].raw.ordinal, 9);
        assert_eq!(citations[3].raw.text, "DOI: 10.1234/orphan.two");
        assert_eq!(citations[3].fields.doi.as_deref(), Some("10.1234/orphan.two"));
    }

    #[test]
    fn test_empty_document() {
        let err = CitationExtractor::new().extract("   \n\t").unwrap_err();
        assert!(matches!(err, ParsingError::EmptyDocument));
    }

    #[test]
    fn test_no_citations() {
        let err = CitationExtractor::new()
            .extract("Just some prose without any references at all.")
            .unwrap_err();
        assert!(matches!(err, ParsingError::NoCitations));
    }

    #[test]
    fn test_doi_only_document() {
        let result = CitationExtractor::new()
            .extract("Data are at 10.5281/zenodo.1234567 and 10.5061/dryad.abc123.")
            .unwrap();
        assert_eq!(result.strategy, None);
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.doi_only_count(), 2);
        assert_eq!(result.citations[0].raw.ordinal, 1);
    }
}
