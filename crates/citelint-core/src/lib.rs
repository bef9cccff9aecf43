use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod config_file;
pub mod doi;
pub mod lookup;
pub mod rate_limit;
pub mod similarity;
pub mod verifier;

// Re-export for convenience
pub use doi::{is_valid_doi, normalize_doi};
pub use lookup::{IdentifierLookup, LookupBackend, LookupError, QueryKind};
pub use rate_limit::AdaptiveLimiter;
pub use similarity::similarity;

/// A citation candidate cut out of the references section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCitation {
    pub text: String,
    /// Declared number (`[n]`, `n.`) or 1-based sequential position.
    pub ordinal: u32,
}

impl RawCitation {
    pub fn new(ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ordinal,
        }
    }
}

/// Bibliographic signals used when neither a DOI nor a title is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BiblioQuery {
    pub author: Option<String>,
    pub year: Option<String>,
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
}

impl BiblioQuery {
    /// Number of independent signals found. Volume and page count as one.
    pub fn signal_count(&self) -> usize {
        [
            self.author.is_some(),
            self.year.is_some(),
            self.venue.is_some(),
            self.volume.is_some() || self.page.is_some(),
        ]
        .iter()
        .filter(|found| **found)
        .count()
    }

    pub fn is_usable(&self) -> bool {
        self.signal_count() >= 2
    }

    /// Free-text query: surname, venue, year, volume, omitting absent fields.
    pub fn query_string(&self) -> String {
        [&self.author, &self.venue, &self.year, &self.volume]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Identifying fields extracted from one citation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub doi: Option<String>,
    pub title: Option<String>,
    /// Only set when the bundle is usable.
    pub biblio: Option<BiblioQuery>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.doi.is_none() && self.title.is_none() && self.biblio.is_none()
    }
}

/// A citation ready for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub raw: RawCitation,
    pub fields: ExtractedFields,
}

/// One author of a [`CandidateWork`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub family_name: String,
    pub display_name: String,
}

/// A bibliographic record returned by a lookup backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateWork {
    pub doi: String,
    pub title: String,
    pub authors: Vec<Author>,
    pub published_year: String,
    pub venue: String,
}

pub const UNKNOWN: &str = "Unknown";

impl Default for CandidateWork {
    fn default() -> Self {
        Self {
            doi: String::new(),
            title: UNKNOWN.to_string(),
            authors: Vec::new(),
            published_year: UNKNOWN.to_string(),
            venue: UNKNOWN.to_string(),
        }
    }
}

impl CandidateWork {
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.display_name.as_str()).collect()
    }
}

/// Which stage of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Doi,
    Title,
    Biblio,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Doi => "doi",
            Method::Title => "title",
            Method::Biblio => "biblio",
        }
    }

    /// How much a verified match by this method can be trusted.
    pub fn confidence(&self) -> f64 {
        match self {
            Method::Doi => 1.0,
            Method::Title => 0.9,
            Method::Biblio => 0.7,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification of a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Verified,
    NotFound,
    Indeterminate,
}

/// The terminal record for one citation.
///
/// Build through [`VerificationResult::verified`], [`VerificationResult::not_found`]
/// or [`VerificationResult::indeterminate`]: `resolved_work` is present exactly
/// when `status` is [`Status::Verified`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub ordinal: u32,
    pub raw_text: String,
    pub doi: Option<String>,
    pub method: Option<Method>,
    pub status: Status,
    pub resolved_work: Option<CandidateWork>,
    pub similarity: Option<f64>,
    pub error_detail: Option<String>,
}

impl VerificationResult {
    pub fn verified(
        raw: &RawCitation,
        doi: Option<String>,
        method: Method,
        work: CandidateWork,
        similarity: Option<f64>,
    ) -> Self {
        let doi = doi.or_else(|| (!work.doi.is_empty()).then(|| work.doi.clone()));
        Self {
            ordinal: raw.ordinal,
            raw_text: raw.text.clone(),
            doi,
            method: Some(method),
            status: Status::Verified,
            resolved_work: Some(work),
            similarity,
            error_detail: None,
        }
    }

    pub fn not_found(
        raw: &RawCitation,
        doi: Option<String>,
        method: Method,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            ordinal: raw.ordinal,
            raw_text: raw.text.clone(),
            doi,
            method: Some(method),
            status: Status::NotFound,
            resolved_work: None,
            similarity: None,
            error_detail: Some(reason.into()),
        }
    }

    pub fn indeterminate(
        raw: &RawCitation,
        doi: Option<String>,
        method: Option<Method>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            ordinal: raw.ordinal,
            raw_text: raw.text.clone(),
            doi,
            method,
            status: Status::Indeterminate,
            resolved_work: None,
            similarity: None,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == Status::Verified
    }

    /// Confidence of a verified match; 0 for anything else.
    pub fn confidence(&self) -> f64 {
        match (self.status, self.method) {
            (Status::Verified, Some(method)) => method.confidence(),
            _ => 0.0,
        }
    }
}

/// Progress events emitted during verification.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checking {
        index: usize,
        total: usize,
        ordinal: u32,
        label: String,
    },
    Result {
        index: usize,
        total: usize,
        result: Box<VerificationResult>,
    },
    /// The run was cancelled; `completed` results were kept.
    Cancelled { completed: usize, total: usize },
}

impl ProgressEvent {
    /// Fraction of citations finished once this event has been observed.
    pub fn fraction(&self) -> f64 {
        let (done, total) = match self {
            ProgressEvent::Checking { index, total, .. } => (*index, *total),
            ProgressEvent::Result { index, total, .. } => (index + 1, *total),
            ProgressEvent::Cancelled { completed, total } => (*completed, *total),
        };
        if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        }
    }
}

/// Summary statistics for a complete check run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    pub total: usize,
    pub verified: usize,
    pub not_found: usize,
    pub indeterminate: usize,
    pub verified_by_doi: usize,
    pub verified_by_title: usize,
    pub verified_by_biblio: usize,
}

impl CheckStats {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let mut stats = CheckStats {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                Status::Verified => {
                    stats.verified += 1;
                    match result.method {
                        Some(Method::Doi) => stats.verified_by_doi += 1,
                        Some(Method::Title) => stats.verified_by_title += 1,
                        Some(Method::Biblio) => stats.verified_by_biblio += 1,
                        None => {}
                    }
                }
                Status::NotFound => stats.not_found += 1,
                Status::Indeterminate => stats.indeterminate += 1,
            }
        }
        stats
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Configuration for the verification run.
#[derive(Clone)]
pub struct Config {
    /// Contact address sent to CrossRef to join its polite pool.
    pub crossref_mailto: Option<String>,
    pub timeout_secs: u64,
    /// Candidates requested per search; only the first is used.
    pub search_rows: usize,
    /// Courtesy pause between dependent lookups issued sequentially.
    pub request_delay: Duration,
    /// Citations verified concurrently per batch. 1 means sequential.
    pub batch_size: usize,
    /// Pause between batches when `batch_size > 1`.
    pub batch_delay: Duration,
    /// Titles must be longer than this (in characters) to be searched.
    pub min_title_len: usize,
    /// Optional hard gate on title similarity. `None` defers to the
    /// lookup service's own ranking.
    pub min_title_similarity: Option<f64>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("search_rows", &self.search_rows)
            .field("request_delay", &self.request_delay)
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .field("min_title_len", &self.min_title_len)
            .field("min_title_similarity", &self.min_title_similarity)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crossref_mailto: None,
            timeout_secs: 10,
            search_rows: 1,
            request_delay: Duration::from_millis(200),
            batch_size: 1,
            batch_delay: Duration::from_secs(1),
            min_title_len: 15,
            min_title_similarity: None,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the orchestrator cannot honor.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.batch_size == 0 {
            return Err(CoreError::Config("batch_size must be at least 1".into()));
        }
        if self.search_rows == 0 {
            return Err(CoreError::Config("search_rows must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::Config("timeout_secs must be positive".into()));
        }
        if let Some(min) = self.min_title_similarity
            && !(0.0..=1.0).contains(&min)
        {
            return Err(CoreError::Config(format!(
                "min_title_similarity must be within [0, 1], got {min}"
            )));
        }
        Ok(())
    }
}

/// Verify a list of citations against a lookup backend.
///
/// Citations are processed in input order and progress is reported through
/// the callback. Cancelling the token stops the run between citations and
/// returns the results gathered so far.
pub async fn verify_citations(
    citations: Vec<Citation>,
    lookup: &dyn LookupBackend,
    config: &Config,
    progress: impl Fn(ProgressEvent) + Send + Sync,
    cancel: CancellationToken,
) -> Vec<VerificationResult> {
    verifier::verify_citations(citations, lookup, config, progress, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawCitation {
        RawCitation::new(7, "[7] Smith, J. A study of things. Nature 12, 34 (2020).")
    }

    #[test]
    fn biblio_query_string_order() {
        let q = BiblioQuery {
            author: Some("Smith".into()),
            year: Some("2020".into()),
            venue: Some("Nature".into()),
            volume: Some("12".into()),
            page: Some("34".into()),
        };
        assert_eq!(q.query_string(), "Smith Nature 2020 12");
        assert_eq!(q.signal_count(), 4);
    }

    #[test]
    fn biblio_query_omits_absent_fields() {
        let q = BiblioQuery {
            author: Some("Smith".into()),
            year: Some("2020".into()),
            ..Default::default()
        };
        assert_eq!(q.query_string(), "Smith 2020");
        assert!(q.is_usable());
    }

    #[test]
    fn biblio_volume_and_page_count_once() {
        let q = BiblioQuery {
            volume: Some("12".into()),
            page: Some("34".into()),
            ..Default::default()
        };
        assert_eq!(q.signal_count(), 1);
        assert!(!q.is_usable());
    }

    #[test]
    fn verified_result_carries_work() {
        let work = CandidateWork {
            doi: "10.1038/nature12373".into(),
            title: "A study of things".into(),
            ..Default::default()
        };
        let r = VerificationResult::verified(&raw(), None, Method::Title, work, Some(0.8));
        assert_eq!(r.status, Status::Verified);
        assert!(r.resolved_work.is_some());
        assert_eq!(r.doi.as_deref(), Some("10.1038/nature12373"));
        assert_eq!(r.ordinal, 7);
        assert!((r.confidence() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_results_have_no_work() {
        let nf = VerificationResult::not_found(&raw(), None, Method::Doi, "identifier not found");
        assert!(nf.resolved_work.is_none());
        assert_eq!(nf.confidence(), 0.0);

        let ind = VerificationResult::indeterminate(&raw(), None, None, "timeout");
        assert!(ind.resolved_work.is_none());
        assert_eq!(ind.method, None);
        assert_eq!(ind.error_detail.as_deref(), Some("timeout"));
    }

    #[test]
    fn candidate_defaults_are_unknown() {
        let w = CandidateWork::default();
        assert_eq!(w.title, "Unknown");
        assert_eq!(w.published_year, "Unknown");
        assert_eq!(w.venue, "Unknown");
        assert!(w.authors.is_empty());
    }

    #[test]
    fn stats_count_by_status_and_method() {
        let r = raw();
        let results = vec![
            VerificationResult::verified(&r, None, Method::Doi, CandidateWork::default(), None),
            VerificationResult::verified(&r, None, Method::Biblio, CandidateWork::default(), None),
            VerificationResult::not_found(&r, None, Method::Title, "no matching publication"),
            VerificationResult::indeterminate(&r, None, Some(Method::Doi), "HTTP 500"),
        ];
        let stats = CheckStats::from_results(&results);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.verified_by_doi, 1);
        assert_eq!(stats.verified_by_biblio, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.indeterminate, 1);
    }

    #[test]
    fn progress_fraction() {
        let ev = ProgressEvent::Result {
            index: 1,
            total: 4,
            result: Box::new(VerificationResult::indeterminate(&raw(), None, None, "x")),
        };
        assert!((ev.fraction() - 0.5).abs() < f64::EPSILON);
        let done = ProgressEvent::Cancelled {
            completed: 0,
            total: 0,
        };
        assert_eq!(done.fraction(), 1.0);
    }

    #[test]
    fn config_debug_masks_mailto() {
        let config = Config {
            crossref_mailto: Some("me@example.org".into()),
            ..Config::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("me@example.org"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn config_validation() {
        assert!(Config::default().validate().is_ok());
        let bad = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(bad.validate().is_err());
        let bad = Config {
            min_title_similarity: Some(1.5),
            ..Config::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn results_serialize_snake_case() {
        let r = VerificationResult::not_found(&raw(), None, Method::Doi, "identifier not found");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["method"], "doi");
    }
}
