//! Security headers middleware
//!
//! Adds security headers to all HTTP responses:
//! - Content-Security-Policy: restricts resource loading
//! - X-Content-Type-Options: nosniff - prevents MIME type sniffing
//! - X-Frame-Options: DENY - prevents clickjacking
//! - X-XSS-Protection: 1; mode=block - XSS filtering in older browsers
//! - Referrer-Policy: controls referrer information
//! - Strict-Transport-Security: only in production, where TLS terminates in front of us

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use keyhold_core::Environment;

/// Content Security Policy sent with every response
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' 'unsafe-eval' https://unpkg.com https://cdn.jsdelivr.net; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com https://unpkg.com; \
    img-src 'self' data: https: blob:; \
    media-src 'self' https: blob: data:; \
    connect-src 'self' https: wss: ws:; \
    font-src 'self' https://fonts.gstatic.com data:; \
    frame-src 'self'; \
    object-src 'none'; \
    base-uri 'self';";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Security headers middleware
pub async fn security_headers_middleware(
    State(environment): State<Environment>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if environment.is_production() {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn test_handler() -> impl IntoResponse {
        (StatusCode::OK, "test response")
    }

    fn app(environment: Environment) -> Router {
        Router::new().route("/test", get(test_handler)).layer(
            middleware::from_fn_with_state(environment, security_headers_middleware),
        )
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(Environment::Development).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(
            headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(
            headers.get(header::X_XSS_PROTECTION).unwrap(),
            "1; mode=block"
        );
        assert_eq!(
            headers.get(header::REFERRER_POLICY).unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert!(headers
            .get(header::CONTENT_SECURITY_POLICY)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("default-src 'self';"));

        // No HSTS outside production
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_hsts_in_production() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(Environment::Production).oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::STRICT_TRANSPORT_SECURITY)
                .unwrap(),
            HSTS
        );
    }

    #[tokio::test]
    async fn test_security_headers_on_not_found() {
        let request = Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        let response = app(Environment::Development).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response
            .headers()
            .get(header::X_CONTENT_TYPE_OPTIONS)
            .is_some());
    }
}
