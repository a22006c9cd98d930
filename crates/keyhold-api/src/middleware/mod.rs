//! HTTP middleware applied to every route

pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::{standard_headers_middleware, ClientIpKeyExtractor, IpRateLimiter};
pub use security_headers::security_headers_middleware;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS layer allowing only the whitelisted origins
///
/// Requests without an `Origin` header are not affected. Entries that are
/// not valid header values are skipped with a warning.
pub fn cors_layer(whitelist: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = whitelist
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}
