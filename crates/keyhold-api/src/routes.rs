//! API route definitions

use crate::auth::require_access_token;
use crate::handlers::{auth, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Authentication routes
///
/// Register, login, refresh and logout are public. The refresh and logout
/// endpoints authenticate with the refresh token in the body, not a header.
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh-token", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(state, require_access_token));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health probes and the CSP report sink
pub fn system_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/csp-violation-report", post(health::csp_report_handler))
}
