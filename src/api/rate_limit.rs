//! Request-level rate limiting using governor, plus the daily message cap.
//!
//! Two ceilings, both separate from the per-action quota gate: a
//! per-minute governor limiter throttles how fast any one identity can
//! hit the API at all, and a per-day message counter caps how many turns
//! an identity may submit before the next UTC day. Authenticated users
//! are keyed by user ID; guests by origin fingerprint, since their IDs
//! are fresh per request.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, Timelike};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::Mutex;
use serde::Serialize;

use crate::AppState;
use crate::usage::day_key;

/// Rate limiter type alias.
pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Messages submitted by one identity on one day.
#[derive(Debug, Clone, Copy)]
struct DailyCount {
    day: NaiveDate,
    used: u32,
}

/// Per-identity rate limiters backed by an in-memory map.
pub struct IdentityRateLimiters {
    limiters: Mutex<HashMap<String, Arc<DirectRateLimiter>>>,
    quota: Quota,
    daily: Mutex<HashMap<String, DailyCount>>,
    daily_message_cap: u32,
}

impl std::fmt::Debug for IdentityRateLimiters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRateLimiters")
            .field("tracked", &self.limiters.lock().len())
            .field("daily_message_cap", &self.daily_message_cap)
            .finish()
    }
}

impl IdentityRateLimiters {
    /// Create a limiter collection with the given per-minute quota and
    /// per-day message cap.
    pub fn new(requests_per_minute: u32, burst: u32, daily_message_cap: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiters: Mutex::new(HashMap::new()),
            quota,
            daily: Mutex::new(HashMap::new()),
            daily_message_cap,
        }
    }

    /// Get or create a rate limiter for a key.
    pub fn get_or_create(&self, key: &str) -> Arc<DirectRateLimiter> {
        let mut limiters = self.limiters.lock();

        if let Some(limiter) = limiters.get(key) {
            return Arc::clone(limiter);
        }

        let limiter = Arc::new(RateLimiter::direct(self.quota));
        limiters.insert(key.to_string(), Arc::clone(&limiter));
        limiter
    }

    /// Charge one message against the identity's daily cap.
    ///
    /// `Err` carries the seconds until the cap resets at the next UTC
    /// midnight. Counters for past days roll over in place.
    pub fn check_daily_message(&self, key: &str) -> Result<(), u64> {
        self.check_daily_message_on(key, day_key())
    }

    fn check_daily_message_on(&self, key: &str, today: NaiveDate) -> Result<(), u64> {
        let mut daily = self.daily.lock();
        let count = daily
            .entry(key.to_string())
            .or_insert(DailyCount { day: today, used: 0 });

        if count.day != today {
            count.day = today;
            count.used = 0;
        }

        if count.used >= self.daily_message_cap {
            return Err(seconds_until_utc_midnight());
        }

        count.used += 1;
        Ok(())
    }
}

fn seconds_until_utc_midnight() -> u64 {
    let elapsed = u64::from(chrono::Utc::now().time().num_seconds_from_midnight());
    86_400_u64.saturating_sub(elapsed).max(1)
}

/// Rate limit error response.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitError {
    /// Error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Suggested wait before retrying.
    pub retry_after_secs: Option<u64>,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_secs;
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

/// Per-identity rate limiting middleware.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    let key = state.resolver.resolve(req.headers()).rate_key();

    let limiter = state.limiters.get_or_create(&key);

    match limiter.check() {
        Ok(_) => Ok(next.run(req).await),
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            Err(RateLimitError {
                error: "rate_limit_exceeded".to_string(),
                message: "Rate limit exceeded. Please try again later.".to_string(),
                retry_after_secs: Some(wait.as_secs()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_throttle() {
        let limiters = IdentityRateLimiters::new(60, 2, 100);
        let limiter = limiters.get_or_create("user-1");

        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn keys_are_isolated() {
        let limiters = IdentityRateLimiters::new(60, 1, 100);
        assert!(limiters.get_or_create("a").check().is_ok());
        assert!(limiters.get_or_create("b").check().is_ok());
        assert!(limiters.get_or_create("a").check().is_err());
    }

    #[test]
    fn daily_cap_exhausts_then_reports_reset_time() {
        let limiters = IdentityRateLimiters::new(60, 10, 2);

        assert!(limiters.check_daily_message("user-1").is_ok());
        assert!(limiters.check_daily_message("user-1").is_ok());

        let retry = limiters.check_daily_message("user-1").unwrap_err();
        assert!(retry >= 1 && retry <= 86_400);

        // Other identities are unaffected
        assert!(limiters.check_daily_message("user-2").is_ok());
    }

    #[test]
    fn daily_cap_rolls_over_at_the_day_boundary() {
        let limiters = IdentityRateLimiters::new(60, 10, 1);
        let yesterday = day_key().pred_opt().unwrap();

        assert!(limiters.check_daily_message_on("user-1", yesterday).is_ok());
        assert!(limiters.check_daily_message_on("user-1", yesterday).is_err());

        // A new day resets the counter in place
        assert!(limiters.check_daily_message_on("user-1", day_key()).is_ok());
    }
}
