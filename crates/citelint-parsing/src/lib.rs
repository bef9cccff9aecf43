use thiserror::Error;

pub mod biblio;
pub mod config;
pub mod extractor;
pub mod fields;
pub mod identifiers;
pub mod section;
pub mod splitter;
pub mod text_processing;
pub mod title;

pub use config::{ListOverride, ParsingConfig, ParsingConfigBuilder};
pub use extractor::{CitationExtractor, ExtractionResult};
pub use fields::extract_fields;
pub use section::{LocatedSection, SectionSource, locate};
pub use splitter::{CitationSplitter, SegmentationStrategy, SplitOutcome, SplitStrategy, split};
// Re-export domain types from core (canonical definitions live there)
pub use citelint_core::{BiblioQuery, Citation, ExtractedFields, RawCitation};

#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("document contains no text")]
    EmptyDocument,
    #[error("no citations found")]
    NoCitations,
}

/// Extract citations from the plain text of a document.
///
/// Pipeline:
/// 1. Locate the references section (header, numbered list, or document tail)
/// 2. Split it into citations with the first strategy that yields enough pieces
/// 3. For each citation, extract DOI, title, and bibliographic signals
/// 4. Sweep the whole document for DOIs, attaching them to citations that
///    contain them and appending DOI-only citations for the rest
pub fn extract_citations(text: &str) -> Result<ExtractionResult, ParsingError> {
    CitationExtractor::new().extract(text)
}
