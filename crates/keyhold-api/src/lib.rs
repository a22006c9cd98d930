//! Keyhold API - authentication REST server
//!
//! Provides user registration, login and JWT token lifecycle endpoints,
//! with OpenAPI documentation served through Swagger UI.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn_with_state, map_response_with_state},
    Router,
};
use middleware::{
    cors_layer, security_headers_middleware, standard_headers_middleware, IpRateLimiter,
};
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the Keyhold API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keyhold API",
        version = "0.1.0",
        description = "User registration, login and JWT token lifecycle",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::me_handler,
    ),
    components(
        schemas(
            error::ApiError,
            handlers::health::HealthResponse,
            handlers::health::ReadinessResponse,
            handlers::auth::CredentialsRequest,
            handlers::auth::RefreshTokenRequest,
            handlers::auth::AuthTokensResponse,
            handlers::auth::RefreshResponse,
            handlers::auth::MessageResponse,
            handlers::auth::ProfileResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "auth", description = "Registration, login and token management"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme used by protected endpoints
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;

    let mut router = Router::new()
        .merge(routes::system_routes())
        .merge(routes::auth_routes(state.clone()))
        .with_state(state.clone())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(server.max_body_size));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        match IpRateLimiter::from_config(rate_limit) {
            Some(limiter) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    limiter.spawn_pruning(rate_limit.window());
                } else {
                    tracing::warn!("no tokio runtime, rate limiter state will not be pruned");
                }
                router = router
                    .layer(limiter.layer())
                    .layer(map_response_with_state(
                        limiter.period(),
                        standard_headers_middleware,
                    ));
            }
            None => tracing::warn!("rate limit configuration unusable, limiter not installed"),
        }
    }

    router
        .layer(from_fn_with_state(
            server.environment,
            security_headers_middleware,
        ))
        .layer(cors_layer(&server.cors_whitelist))
        .layer(TraceLayer::new_for_http())
}

/// Router over an in-memory store, with fast password hashing and no rate limiting
pub fn create_router_for_testing() -> Router {
    let mut config = keyhold_core::AppConfig::default();
    config.auth.password = keyhold_core::PasswordConfig::insecure_fast();
    config.rate_limit.enabled = false;
    create_router(Arc::new(AppState::in_memory(config)))
}
