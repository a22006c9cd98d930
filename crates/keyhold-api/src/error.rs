//! API error handling
//!
//! Every handler returns `Result<_, AuthError>`. Lower layers keep their own
//! error enums and are converted here, so nothing reaches the client without
//! being mapped to one of the statuses below.

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::auth::repository::RepositoryError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyhold_core::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    #[schema(example = "Invalid credentials")]
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Authentication error taxonomy
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input (400)
    #[error("{0}")]
    Validation(String),

    /// Password does not match (400)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No such user (404)
    #[error("{0}")]
    NotFound(String),

    /// Token absent from the request (401)
    #[error("{0}")]
    MissingToken(String),

    /// Token unknown, revoked, expired or badly signed (403)
    #[error("{0}")]
    InvalidToken(String),

    /// Persistence or unexpected failure (500); the message is client-safe
    #[error("{0}")]
    Server(String),
}

impl AuthError {
    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".to_string())
    }

    pub fn refresh_token_required() -> Self {
        Self::MissingToken("Refresh token required".to_string())
    }

    pub fn invalid_refresh_token() -> Self {
        Self::InvalidToken("Invalid refresh token".to_string())
    }

    pub fn access_token_required() -> Self {
        Self::MissingToken("Access token required".to_string())
    }

    pub fn invalid_access_token() -> Self {
        Self::InvalidToken("Invalid access token".to_string())
    }

    pub fn internal() -> Self {
        Self::Server("Internal server error".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::MissingToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken(_) => StatusCode::FORBIDDEN,
            AuthError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiError::new(self.to_string()))).into_response()
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::EmailAlreadyExists => {
                AuthError::Server("Email already registered".to_string())
            }
            other => {
                tracing::error!(error = %other, "credential store failure");
                AuthError::internal()
            }
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "password hashing failure");
        AuthError::internal()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        tracing::error!(error = %err, "token signing failure");
        AuthError::internal()
    }
}
