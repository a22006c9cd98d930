//! Rate limiting middleware
//!
//! Limits each client IP to `max_requests` per `window_secs` (100 per 15
//! minutes by default) with a keyed GCRA limiter from `tower_governor`. The
//! full allowance is available as a burst and refills evenly across the
//! window.
//!
//! Clients are keyed on the TCP peer address. Proxy headers are only
//! consulted when `rate_limit.trust_proxy_headers` is set.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use governor::middleware::StateInformationMiddleware;
use keyhold_core::RateLimitConfig;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_governor::{
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
    GovernorError, GovernorLayer,
};

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Body sent with 429 responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    pub error: String,
    pub retry_after: String,
}

/// Picks the address a request is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIpKeyExtractor {
    /// The TCP peer from `ConnectInfo`
    Peer,
    /// `X-Forwarded-For`, `X-Real-IP` or `Forwarded`, falling back to the peer
    Forwarded,
}

impl ClientIpKeyExtractor {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if config.trust_proxy_headers {
            Self::Forwarded
        } else {
            Self::Peer
        }
    }
}

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn name(&self) -> &'static str {
        match self {
            Self::Peer => "peer IP",
            Self::Forwarded => "forwarded IP",
        }
    }

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        match self {
            Self::Peer => PeerIpKeyExtractor.extract(req),
            Self::Forwarded => SmartIpKeyExtractor.extract(req),
        }
    }

    fn key_name(&self, key: &Self::Key) -> Option<String> {
        Some(key.to_string())
    }
}

pub type IpGovernorConfig = GovernorConfig<ClientIpKeyExtractor, StateInformationMiddleware>;
pub type IpGovernorLayer = GovernorLayer<ClientIpKeyExtractor, StateInformationMiddleware>;

/// Per-IP request limiter shared by every route
pub struct IpRateLimiter {
    config: Arc<IpGovernorConfig>,
    period: Duration,
}

impl IpRateLimiter {
    /// Build a limiter from configuration, or `None` if the numbers are unusable
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        Self::new(
            config.replenish_period()?,
            config.max_requests,
            config.window(),
            ClientIpKeyExtractor::from_config(config),
        )
    }

    fn new(
        period: Duration,
        burst: u32,
        window: Duration,
        key_extractor: ClientIpKeyExtractor,
    ) -> Option<Self> {
        let config = GovernorConfigBuilder::default()
            .period(period)
            .burst_size(burst)
            .key_extractor(key_extractor)
            .use_headers()
            .error_handler(move |error| error_response(error, burst, window))
            .finish()?;

        Some(Self {
            config: Arc::new(config),
            period,
        })
    }

    pub fn layer(&self) -> IpGovernorLayer {
        GovernorLayer {
            config: self.config.clone(),
        }
    }

    /// Time for one request of allowance to refill
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of client IPs currently holding limiter state
    pub fn tracked_clients(&self) -> usize {
        self.config.limiter().len()
    }

    /// Forget clients whose allowance has fully refilled
    pub fn prune(&self) {
        prune(&self.config);
    }

    /// Prune every `every` until the limiter and its layers are dropped
    pub fn spawn_pruning(&self, every: Duration) -> JoinHandle<()> {
        let config = Arc::downgrade(&self.config);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticks.tick().await;
                let Some(config) = config.upgrade() else {
                    break;
                };
                prune(&config);
            }
        })
    }
}

fn prune(config: &IpGovernorConfig) {
    let limiter = config.limiter();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    tracing::debug!(tracked = limiter.len(), "rate limiter pruned");
}

/// Turn limiter failures into JSON responses
fn error_response(error: GovernorError, limit: u32, window: Duration) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => {
            // governor reports whole seconds rounded down
            let retry_secs = wait_time + 1;
            let body = RateLimitExceeded {
                error: "Too many requests from this IP, please try again later.".to_string(),
                retry_after: describe_window(window),
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_secs));
            headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(RATELIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(RATELIMIT_RESET, HeaderValue::from(retry_secs));
            response
        }
        GovernorError::UnableToExtractKey => {
            tracing::error!("rate limiter could not determine the client address");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Unable to determine client address" })),
            )
                .into_response()
        }
        GovernorError::Other { code, msg, headers } => {
            let mut response = (
                code,
                Json(serde_json::json!({ "error": msg.unwrap_or_default() })),
            )
                .into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

/// Rewrite the limiter's `x-ratelimit-*` headers as `RateLimit-*`
///
/// `RateLimit-Reset` is the number of seconds until the full allowance is
/// available again.
pub async fn standard_headers_middleware(
    State(period): State<Duration>,
    mut response: Response,
) -> Response {
    let headers = response.headers_mut();
    let limit = take_number(headers, X_RATELIMIT_LIMIT);
    let remaining = take_number(headers, X_RATELIMIT_REMAINING);

    if let (Some(limit), Some(remaining)) = (limit, remaining) {
        let reset = period * limit.saturating_sub(remaining);
        let reset_secs = reset.as_secs() + u64::from(reset.subsec_nanos() > 0);
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
    }
    response
}

fn take_number(headers: &mut HeaderMap, name: &str) -> Option<u32> {
    headers
        .remove(name)
        .and_then(|v| v.to_str().ok().and_then(|v| v.parse().ok()))
}

fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}
