/// Authentication middleware for protecting routes
///
/// Extracts and validates the access token from the Authorization header.
/// On success, adds the authenticated user to request extensions.
use crate::error::AuthError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated user information extracted from an access token
///
/// Handlers behind [`require_access_token`] read it with
/// `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User's unique identifier
    pub user_id: Uuid,
    /// JWT token ID
    pub jti: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid access token
pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request).ok_or_else(AuthError::access_token_required)?;
    let claims = state.auth.authenticate(token)?;

    let user = AuthenticatedUser {
        user_id: claims.user_id().map_err(|_| AuthError::invalid_access_token())?,
        jti: claims.jti,
    };
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
