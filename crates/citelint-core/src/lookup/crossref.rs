use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use super::{IdentifierLookup, LookupBackend, LookupError, QueryKind};
use crate::rate_limit::{AdaptiveLimiter, check_rate_limit_response};
use crate::{Author, CandidateWork, Config, CoreError, UNKNOWN, is_valid_doi};

pub const CROSSREF_WORKS_URL: &str = "https://api.crossref.org/works";

/// Fields requested from the search endpoint; everything [`parse_work`] reads.
const SELECT_FIELDS: &str =
    "DOI,title,author,published-print,published-online,issued,created,container-title";

/// Authors kept per work.
const MAX_AUTHORS: usize = 10;

/// CrossRef REST API client.
pub struct CrossRef {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    timeout: Duration,
    rows: usize,
    limiter: AdaptiveLimiter,
}

impl CrossRef {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: CROSSREF_WORKS_URL.to_string(),
            mailto: config.crossref_mailto.clone(),
            timeout: config.timeout(),
            rows: config.search_rows.max(1),
            limiter: AdaptiveLimiter::for_crossref(config.crossref_mailto.is_some()),
        })
    }

    /// Point the client at a different `works` endpoint (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn user_agent(&self) -> String {
        match &self.mailto {
            Some(email) => format!("CitationLint/1.0 (mailto:{})", email),
            None => "CitationLint/1.0".to_string(),
        }
    }

    fn work_url(&self, doi: &str) -> String {
        let path: Vec<_> = doi
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    fn search_url(&self, query: &str, kind: QueryKind, year: Option<u16>) -> String {
        let field = match kind {
            QueryKind::Title => "query.title",
            QueryKind::Bibliographic => "query.bibliographic",
        };
        let mut url = format!(
            "{}?{}={}&rows={}&select={}",
            self.base_url,
            field,
            urlencoding::encode(query),
            self.rows,
            urlencoding::encode(SELECT_FIELDS)
        );
        // Publication dates drift a year either way between print and online
        if let Some(year) = year {
            let filter = format!(
                "from-pub-date:{},until-pub-date:{}",
                year.saturating_sub(1),
                year.saturating_add(1)
            );
            url.push_str(&format!("&filter={}", urlencoding::encode(&filter)));
        }
        if let Some(ref email) = self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(email)));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Value, LookupError> {
        self.limiter.acquire().await;

        let resp = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent())
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        if let Err(e) = check_rate_limit_response(&resp) {
            self.limiter.on_rate_limited();
            return Err(e);
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Http {
                status: status.as_u16(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))
    }

    async fn fetch_work(&self, doi: &str) -> IdentifierLookup {
        if !is_valid_doi(doi) {
            return IdentifierLookup::Error(LookupError::InvalidDoi(doi.to_string()).to_string());
        }

        match self.get_json(&self.work_url(doi)).await {
            Ok(data) => {
                let mut work = parse_work(&data["message"]);
                if work.doi.is_empty() {
                    work.doi = doi.to_string();
                }
                IdentifierLookup::Found(work)
            }
            Err(LookupError::Http { status: 404 }) => IdentifierLookup::NotFound,
            Err(LookupError::Http { status }) => {
                IdentifierLookup::Error(format!("CrossRef API error: HTTP {}", status))
            }
            Err(e) => IdentifierLookup::Error(format!("CrossRef lookup failed: {}", e)),
        }
    }

    async fn fetch_query(
        &self,
        query: &str,
        kind: QueryKind,
        year: Option<u16>,
    ) -> Result<Vec<CandidateWork>, LookupError> {
        let data = self.get_json(&self.search_url(query, kind, year)).await?;
        let items = data["message"]["items"]
            .as_array()
            .ok_or_else(|| LookupError::Parse("missing message.items".into()))?;
        Ok(items.iter().map(parse_work).collect())
    }
}

impl LookupBackend for CrossRef {
    fn name(&self) -> &str {
        "CrossRef"
    }

    fn lookup_by_identifier<'a>(
        &'a self,
        doi: &'a str,
    ) -> Pin<Box<dyn Future<Output = IdentifierLookup> + Send + 'a>> {
        Box::pin(self.fetch_work(doi))
    }

    fn search_by_query<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>> {
        Box::pin(self.fetch_query(query, kind, None))
    }

    fn search_near_year<'a>(
        &'a self,
        query: &'a str,
        kind: QueryKind,
        year: Option<u16>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateWork>, LookupError>> + Send + 'a>> {
        Box::pin(self.fetch_query(query, kind, year))
    }
}

/// Build a [`CandidateWork`] from a CrossRef work record, defaulting missing
/// fields to "Unknown".
pub fn parse_work(item: &Value) -> CandidateWork {
    let title = first_string(&item["title"]).unwrap_or_else(|| UNKNOWN.to_string());
    let venue = first_string(&item["container-title"]).unwrap_or_else(|| UNKNOWN.to_string());
    let published_year = extract_year(item).unwrap_or_else(|| UNKNOWN.to_string());
    let doi = item["DOI"].as_str().unwrap_or("").to_string();

    CandidateWork {
        doi,
        title,
        authors: extract_authors(&item["author"]),
        published_year,
        venue,
    }
}

/// CrossRef wraps most text fields in single-element arrays.
fn first_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::Array(arr) => arr.first().and_then(|v| v.as_str()),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }?;
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn extract_year(item: &Value) -> Option<String> {
    ["published-print", "published-online", "issued", "created"]
        .iter()
        .find_map(|field| item[*field]["date-parts"][0][0].as_u64())
        .map(|year| year.to_string())
}

fn extract_authors(authors: &Value) -> Vec<Author> {
    let Some(arr) = authors.as_array() else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|a| {
            if let Some(family) = a["family"].as_str() {
                let display_name = match a["given"].as_str() {
                    Some(given) => format!("{} {}", given, family),
                    None => family.to_string(),
                };
                Some(Author {
                    family_name: family.to_string(),
                    display_name,
                })
            } else {
                a["name"].as_str().map(|name| Author {
                    family_name: name.to_string(),
                    display_name: name.to_string(),
                })
            }
        })
        .take(MAX_AUTHORS)
        .collect()
}
