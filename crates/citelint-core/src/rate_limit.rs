//! Adaptive request pacing for lookup backends.
//!
//! Each request waits for a governor permit via `until_ready()`, which spaces
//! requests at the configured rate. On 429 the governor is swapped for a
//! slower one and the error is returned to the caller; nothing is retried.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::lookup::LookupError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MAX_SLOWDOWN: u32 = 16;
const RECOVERY: Duration = Duration::from_secs(60);

/// Rate limiter whose period doubles after every 429, up to 16x, and is
/// restored once a minute passes without another 429.
pub struct AdaptiveLimiter {
    limiter: ArcSwap<DirectLimiter>,
    base_period: Duration,
    current_factor: AtomicU32,
    last_429: Mutex<Option<Instant>>,
}

fn quota_for(period: Duration) -> Quota {
    Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
}

impl AdaptiveLimiter {
    pub fn new(period: Duration) -> Self {
        let limiter = Arc::new(DirectLimiter::direct(quota_for(period)));
        Self {
            limiter: ArcSwap::from(limiter),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: Mutex::new(None),
        }
    }

    /// Create a limiter allowing `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        let ms = 1000 / n.max(1) as u64;
        Self::new(Duration::from_millis(ms))
    }

    /// CrossRef allows noticeably more traffic from the polite pool.
    pub fn for_crossref(has_mailto: bool) -> Self {
        Self::per_second(if has_mailto { 3 } else { 1 })
    }

    pub fn base_period(&self) -> Duration {
        self.base_period
    }

    pub fn slowdown_factor(&self) -> u32 {
        self.current_factor.load(Ordering::SeqCst)
    }

    /// Wait until the limiter allows a request.
    pub async fn acquire(&self) {
        self.try_decay();
        let limiter = self.limiter.load_full();
        limiter.until_ready().await;
    }

    /// Record a 429: double the slowdown factor and swap in a slower governor.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(MAX_SLOWDOWN))
            });

        let factor = self.current_factor.load(Ordering::SeqCst);
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            self.limiter.store(Arc::new(DirectLimiter::direct(quota)));
        }
    }

    fn try_decay(&self) {
        let should_restore = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed() >= RECOVERY))
            .unwrap_or(false);

        if should_restore && self.current_factor.load(Ordering::SeqCst) > 1 {
            self.current_factor.store(1, Ordering::SeqCst);
            let limiter = Arc::new(DirectLimiter::direct(quota_for(self.base_period)));
            self.limiter.store(limiter);
        }
    }
}

/// Check if an HTTP response is a 429 and extract Retry-After if present.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), LookupError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(LookupError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date: not worth a date parser, assume a short conservative wait
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, retry_after: Option<&str>) -> reqwest::Response {
        let mut builder = http::Response::builder().status(status);
        if let Some(value) = retry_after {
            builder = builder.header("retry-after", value);
        }
        reqwest::Response::from(builder.body("").unwrap())
    }

    #[test]
    fn retry_after_values() {
        let cases = [
            ("5", Some(Duration::from_secs(5))),
            (" 0 ", Some(Duration::ZERO)),
            ("Wed, 21 Oct 2015 07:28:00 GMT", Some(Duration::from_secs(5))),
            ("soon", None),
        ];
        for (value, expected) in cases {
            assert_eq!(parse_retry_after(value), expected, "value {value:?}");
        }
    }

    #[test]
    fn only_429_is_rate_limited() {
        assert!(check_rate_limit_response(&response(200, None)).is_ok());
        assert!(check_rate_limit_response(&response(404, Some("10"))).is_ok());
        assert_eq!(
            check_rate_limit_response(&response(429, Some("10"))).unwrap_err(),
            LookupError::RateLimited {
                retry_after: Some(Duration::from_secs(10))
            }
        );
        assert_eq!(
            check_rate_limit_response(&response(429, None)).unwrap_err(),
            LookupError::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn slowdown_doubles_and_caps() {
        let limiter = AdaptiveLimiter::per_second(10);
        assert_eq!(limiter.slowdown_factor(), 1);
        limiter.on_rate_limited();
        assert_eq!(limiter.slowdown_factor(), 2);
        for _ in 0..10 {
            limiter.on_rate_limited();
        }
        assert_eq!(limiter.slowdown_factor(), 16);
    }

    #[test]
    fn polite_pool_is_faster() {
        let anonymous = AdaptiveLimiter::for_crossref(false);
        let polite = AdaptiveLimiter::for_crossref(true);
        assert!(polite.base_period() < anonymous.base_period());
    }

    #[tokio::test]
    async fn decay_restores_after_a_minute() {
        let limiter = AdaptiveLimiter::per_second(10);
        limiter.on_rate_limited();
        limiter.on_rate_limited();
        assert_eq!(limiter.slowdown_factor(), 4);

        {
            let mut last = limiter.last_429.lock().unwrap();
            *last = Some(Instant::now() - Duration::from_secs(61));
        }

        limiter.acquire().await;
        assert_eq!(limiter.slowdown_factor(), 1);
    }
}
