//! In-memory lookup backend for tests and dry runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{IdentifierLookup, LookupBackend, LookupError, QueryKind};
use crate::CandidateWork;

/// A configurable response for [`MockLookup`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Identifier resolves / search returns this single candidate.
    Found(CandidateWork),
    /// Identifier unknown / search returns no candidates.
    NotFound,
    /// Simulate a 429.
    RateLimited,
    /// Simulate a transport failure.
    Error(String),
}

/// Responses handed out one per call; the last one repeats once exhausted.
struct ResponseSequence {
    remaining: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
}

impl ResponseSequence {
    fn new(mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses.last().cloned().unwrap_or(MockResponse::NotFound);
        // Reverse so the next response can be popped off the end.
        responses.reverse();
        Self {
            remaining: Mutex::new(responses),
            fallback,
        }
    }

    fn next(&self) -> MockResponse {
        let mut seq = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

/// A hand-rolled mock implementing [`LookupBackend`].
///
/// Identifier lookups and searches draw from separate response sequences.
/// Every call is counted and every search query is recorded.
pub struct MockLookup {
    identifier: ResponseSequence,
    search: ResponseSequence,
    delay: Option<Duration>,
    identifier_calls: AtomicUsize,
    search_calls: AtomicUsize,
    queries: Mutex<Vec<(String, QueryKind)>>,
    year_hints: Mutex<Vec<Option<u16>>>,
}

impl Default for MockLookup {
    fn default() -> Self {
        Self::new(MockResponse::NotFound, MockResponse::NotFound)
    }
}

impl MockLookup {
    /// A mock that always answers with the same two responses.
    pub fn new(identifier: MockResponse, search: MockResponse) -> Self {
        Self::with_sequences(vec![identifier], vec![search])
    }

    pub fn with_sequences(identifier: Vec<MockResponse>, search: Vec<MockResponse>) -> Self {
        Self {
            identifier: ResponseSequence::new(identifier),
            search: ResponseSequence::new(search),
            delay: None,
            identifier_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            year_hints: Mutex::new(Vec::new()),
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn identifier_calls(&self) -> usize {
        self.identifier_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Search queries received so far, in call order.
    pub fn queries(&self) -> Vec<(String, QueryKind)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Year windows requested through [`LookupBackend::search_near_year`].
    pub fn year_hints(&self) -> Vec<Option<u16>> {
        self.year_hints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LookupBackend for MockLookup {
    fn name(&self) -> &str {
        "Mock"
    }

    fn lookup_by_identifier<'a>(
        &'a self,
        _doi: &'a str,
    ) -> Pin<Box<dyn Future<Output = IdentifierLookup> + Send + 'a>> {
        self.identifier_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.identifier.next();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Found(work) => IdentifierLookup::Found(work),
                MockResponse::NotFound => IdentifierLookup::NotFound,
                MockResponse::RateLimited => IdentifierLookup::Error(
                    LookupError::RateLimited { retry_after: None }.to_string(),
                ),
                MockResponse::Error(msg) => IdentifierLookup::Error(msg),
            }
        })
    }

    fn search_by_query<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), kind));
        let response = self.search.next();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Found(work) => Ok(vec![work]),
                MockResponse::NotFound => Ok(vec![]),
                MockResponse::RateLimited => Err(LookupError::RateLimited { retry_after: None }),
                MockResponse::Error(msg) => Err(LookupError::Network(msg)),
            }
        })
    }

    fn search_near_year<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
        year: Option<u16>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>> {
        self.year_hints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(year);
        self.search_by_query(query, kind)
    }
}
