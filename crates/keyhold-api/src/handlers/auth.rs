//! Authentication API handlers
//!
//! Register, login, refresh and logout, plus the access-token protected
//! profile endpoint. Request and response bodies use camelCase field names.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, AuthError};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Email and password, used by both register and login
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CredentialsRequest {
    /// Email address (lowercased on registration)
    #[schema(example = "user@example.com")]
    pub email: String,
    /// At least 8 characters, one number and one of `!@#$%^&*`
    #[schema(example = "password123!")]
    pub password: String,
}

/// Body of refresh and logout requests
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Tokens issued on register and login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokensResponse {
    #[schema(example = "Login successful")]
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Rotated tokens issued on refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logout successful")]
    pub message: String,
}

/// The authenticated account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
}

/// Register a new user
///
/// The email is converted to lowercase. Both tokens are returned and the
/// refresh token is stored as the user's only active one.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthTokensResponse),
        (status = 400, description = "Invalid email format or password requirements not met", body = ApiError),
        (status = 500, description = "Internal server error or email already registered", body = ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload?;
    let (_, tokens) = state
        .auth
        .register(&request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthTokensResponse {
            message: "User registered successfully".to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

/// Login and obtain JWT tokens
///
/// Replaces any refresh token issued earlier to the same user.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthTokensResponse),
        (status = 400, description = "Invalid credentials", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload?;
    let (_, tokens) = state.auth.login(&request.email, &request.password).await?;

    Ok(Json(AuthTokensResponse {
        message: "Login successful".to_string(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Refresh the JWT access token
///
/// Rotates the refresh token: the one sent in the request stops working.
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Refresh token required", body = ApiError),
        (status = 403, description = "Invalid refresh token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload?;
    let tokens = state.auth.refresh(request.refresh_token.as_deref()).await?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Logout and invalidate the refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "Refresh token required", body = ApiError),
        (status = 403, description = "Invalid refresh token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload?;
    state.auth.logout(request.refresh_token.as_deref()).await?;

    Ok(Json(MessageResponse {
        message: "Logout successful".to_string(),
    }))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Access token required", body = ApiError),
        (status = 403, description = "Invalid access token", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AuthError> {
    let account = state.auth.get_user(user.user_id).await?;

    Ok(Json(ProfileResponse {
        id: account.id.to_string(),
        email: account.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_response_uses_camel_case() {
        let response = AuthTokensResponse {
            message: "Login successful".to_string(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert!(json.get("access_token").is_none());
    }

    #[test]
    fn test_refresh_request_defaults() {
        let request: RefreshTokenRequest = serde_json::from_str("{}").unwrap();
        assert!(request.refresh_token.is_none());

        let request: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(request.refresh_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_credentials_missing_fields_are_empty() {
        let request: CredentialsRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert_eq!(request.email, "a@x.com");
        assert!(request.password.is_empty());
    }
}
