//! The per-citation fallback chain: DOI lookup, then title search, then a
//! bibliographic query.

use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::lookup::{IdentifierLookup, LookupBackend, QueryKind};
use crate::similarity::similarity;
use crate::{Citation, Config, Method, ProgressEvent, RawCitation, VerificationResult};

pub const REASON_IDENTIFIER_NOT_FOUND: &str = "identifier not found";
pub const REASON_NO_MATCH: &str = "no matching publication";
pub const REASON_NOTHING_EXTRACTED: &str = "could not extract identifying information";

/// Verify citations in input order, sequentially or in concurrent batches.
///
/// A cancelled token stops the run between citations (or batches); every
/// result gathered up to that point is returned.
pub async fn verify_citations(
    citations: Vec<Citation>,
    lookup: &dyn LookupBackend,
    config: &Config,
    progress: impl Fn(ProgressEvent) + Send + Sync,
    cancel: CancellationToken,
) -> Vec<VerificationResult> {
    let total = citations.len();
    let batch_size = config.batch_size.max(1);
    let mut results: Vec<VerificationResult> = Vec::with_capacity(total);

    for (batch_no, batch) in citations.chunks(batch_size).enumerate() {
        let pause = if batch_size == 1 {
            config.request_delay
        } else {
            config.batch_delay
        };
        if cancel.is_cancelled() || (batch_no > 0 && !sleep_unless_cancelled(pause, &cancel).await)
        {
            tracing::info!(completed = results.len(), total, "verification cancelled");
            progress(ProgressEvent::Cancelled {
                completed: results.len(),
                total,
            });
            break;
        }

        let offset = batch_no * batch_size;
        for (i, citation) in batch.iter().enumerate() {
            progress(ProgressEvent::Checking {
                index: offset + i,
                total,
                ordinal: citation.raw.ordinal,
                label: label_for(citation),
            });
        }

        let verified = join_all(
            batch
                .iter()
                .map(|citation| verify_citation(citation, lookup, config)),
        )
        .await;

        for (i, result) in verified.into_iter().enumerate() {
            progress(ProgressEvent::Result {
                index: offset + i,
                total,
                result: Box::new(result.clone()),
            });
            results.push(result);
        }
    }

    tracing::info!(
        total,
        processed = results.len(),
        verified = results.iter().filter(|r| r.is_verified()).count(),
        backend = lookup.name(),
        "verification finished"
    );
    results
}

/// Run the fallback chain for a single citation.
pub async fn verify_citation(
    citation: &Citation,
    lookup: &dyn LookupBackend,
    config: &Config,
) -> VerificationResult {
    let raw = &citation.raw;
    let fields = &citation.fields;

    if let Some(doi) = fields.doi.as_deref() {
        return verify_by_identifier(raw, doi, fields.title.as_deref(), lookup).await;
    }

    let year = fields
        .biblio
        .as_ref()
        .and_then(|b| b.year.as_deref())
        .and_then(|y| y.parse::<u16>().ok());

    let title = fields
        .title
        .as_deref()
        .filter(|t| t.chars().count() > config.min_title_len);

    let by_title = match title {
        Some(t) => {
            let result = search(
                raw,
                t,
                QueryKind::Title,
                Method::Title,
                Some(t),
                year,
                lookup,
                config,
            )
            .await;
            if result.is_verified() {
                return result;
            }
            Some(result)
        }
        None => None,
    };

    if let Some(biblio) = fields.biblio.as_ref().filter(|b| b.is_usable()) {
        if by_title.is_some() {
            tokio::time::sleep(config.request_delay).await;
        }
        let query = biblio.query_string();
        let by_biblio = search(
            raw,
            &query,
            QueryKind::Bibliographic,
            Method::Biblio,
            title,
            year,
            lookup,
            config,
        )
        .await;

        // Most recent success wins; a failed biblio query only replaces a
        // title stage that never ran.
        return match by_title {
            Some(previous) if !by_biblio.is_verified() => previous,
            _ => by_biblio,
        };
    }

    by_title.unwrap_or_else(|| {
        tracing::debug!(ordinal = raw.ordinal, "nothing to look up");
        VerificationResult::indeterminate(raw, None, None, REASON_NOTHING_EXTRACTED)
    })
}

/// Verify a bare DOI outside of any document.
pub async fn verify_doi(doi: &str, lookup: &dyn LookupBackend) -> VerificationResult {
    let raw = RawCitation::new(1, doi);
    verify_by_identifier(&raw, doi, None, lookup).await
}

async fn verify_by_identifier(
    raw: &RawCitation,
    doi: &str,
    claimed_title: Option<&str>,
    lookup: &dyn LookupBackend,
) -> VerificationResult {
    tracing::debug!(ordinal = raw.ordinal, doi, "identifier lookup");
    match lookup.lookup_by_identifier(doi).await {
        IdentifierLookup::Found(work) => {
            let score = claimed_title.map(|t| similarity(t, &work.title));
            VerificationResult::verified(raw, Some(doi.to_string()), Method::Doi, work, score)
        }
        IdentifierLookup::NotFound => VerificationResult::not_found(
            raw,
            Some(doi.to_string()),
            Method::Doi,
            REASON_IDENTIFIER_NOT_FOUND,
        ),
        IdentifierLookup::Error(detail) => {
            tracing::debug!(ordinal = raw.ordinal, doi, error = %detail, "identifier lookup failed");
            VerificationResult::indeterminate(raw, Some(doi.to_string()), Some(Method::Doi), detail)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn search(
    raw: &RawCitation,
    query: &str,
    kind: QueryKind,
    method: Method,
    claimed_title: Option<&str>,
    year: Option<u16>,
    lookup: &dyn LookupBackend,
    config: &Config,
) -> VerificationResult {
    tracing::debug!(ordinal = raw.ordinal, method = %method, query, year, "search");
    let candidates = match lookup.search_near_year(query, kind, year).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::debug!(ordinal = raw.ordinal, method = %method, error = %e, "search failed");
            return VerificationResult::indeterminate(raw, None, Some(method), e.to_string());
        }
    };

    let Some(best) = candidates.into_iter().next() else {
        return VerificationResult::not_found(raw, None, method, REASON_NO_MATCH);
    };

    let score = claimed_title.map(|t| similarity(t, &best.title));
    if let (Some(min), Some(score)) = (config.min_title_similarity, score)
        && score < min
    {
        return VerificationResult::not_found(
            raw,
            None,
            method,
            format!(
                "{}: best candidate similarity {:.2} below {:.2}",
                REASON_NO_MATCH, score, min
            ),
        );
    }

    VerificationResult::verified(raw, None, method, best, score)
}

/// Sleep for `delay`, returning `false` if the token fires first.
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}

fn label_for(citation: &Citation) -> String {
    let fields = &citation.fields;
    if let Some(doi) = &fields.doi {
        return format!("doi:{}", doi);
    }
    if let Some(title) = &fields.title {
        return title.clone();
    }
    citation.raw.text.chars().take(60).collect()
}
