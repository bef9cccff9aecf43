//! Lookup backend trait and implementations for querying bibliographic services.

pub mod crossref;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::CandidateWork;

pub use crossref::CrossRef;

/// Which free-text field a search query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Title,
    Bibliographic,
}

/// Outcome of resolving a DOI.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierLookup {
    Found(CandidateWork),
    /// The service confirmed the identifier does not exist.
    NotFound,
    /// Transport, HTTP or parse failure; the identifier may still exist.
    Error(String),
}

/// Error type for lookups, distinguishing rate limiting from other failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("request failed: {0}")]
    Network(String),
    #[error("timed out")]
    Timeout,
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("invalid DOI format: {0}")]
    InvalidDoi(String),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {:.1}s", d.as_secs_f64()),
        None => String::new(),
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else if e.is_decode() {
            LookupError::Parse(e.to_string())
        } else {
            LookupError::Network(e.to_string())
        }
    }
}

/// A bibliographic service that can resolve DOIs and answer free-text queries.
pub trait LookupBackend: Send + Sync {
    /// Human-readable name of the service (e.g. "CrossRef").
    fn name(&self) -> &str;

    /// Resolve a DOI to the work it identifies.
    fn lookup_by_identifier<'a>(
        &'a self,
        doi: &'a str,
    ) -> Pin<Box<dyn Future<Output = IdentifierLookup> + Send + 'a>>;

    /// Search by free text, best candidate first. An empty list means no match.
    fn search_by_query<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>>;

    /// Search restricted to works published within a year of `year`.
    ///
    /// Backends that cannot filter by date run the plain search.
    fn search_near_year<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
        year: Option<u16>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>> {
        let _ = year;
        self.search_by_query(query, kind)
    }
}
