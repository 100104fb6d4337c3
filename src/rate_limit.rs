use crate::config::Settings;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Global request throttle for the OMS API.
///
/// One process-wide quota shared by every protected route, sized by
/// the `rate_limit_per_minute` setting. A zero setting clamps to one
/// request per minute instead of refusing to start.
#[derive(Clone)]
pub struct ApiRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    requests_per_minute: u32,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            requests_per_minute: per_minute.get(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.rate_limit_per_minute)
    }

    /// The configured ceiling, for startup logging.
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Take one slot from the shared quota.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Middleware rejecting requests over the shared quota, answering in
/// the API's JSON error shape.
pub async fn throttle(limiter: ApiRateLimiter, request: Request, next: Next) -> Response {
    if limiter.try_acquire() {
        next.run(request).await
    } else {
        tracing::warn!("Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": "Rate Limit Exceeded",
                "detail": "Too many requests. Please try again later.",
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_allows_within_quota() {
        let limiter = ApiRateLimiter::new(50);
        assert!(limiter.try_acquire());
        assert_eq!(limiter.requests_per_minute(), 50);
    }

    #[test]
    fn test_limiter_rejects_past_quota() {
        let limiter = ApiRateLimiter::new(1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_zero_setting_clamps_instead_of_panicking() {
        let limiter = ApiRateLimiter::new(0);
        assert_eq!(limiter.requests_per_minute(), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            rate_limit_per_minute: 42,
            ..Settings::default()
        };
        let limiter = ApiRateLimiter::from_settings(&settings);
        assert_eq!(limiter.requests_per_minute(), 42);
    }
}
