use citelint_core::ExtractedFields;

use crate::{biblio, identifiers, title};

/// Extract a DOI, a title and (when at least two signals are present) a
/// bibliographic query from one cleaned citation.
pub fn extract_fields(text: &str) -> ExtractedFields {
    let biblio = biblio::extract_biblio(text);
    ExtractedFields {
        doi: identifiers::extract_doi(text),
        title: title::extract_title(text),
        biblio: biblio.is_usable().then_some(biblio),
    }
}
