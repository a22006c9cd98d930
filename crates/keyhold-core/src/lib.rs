//! Keyhold Core - Configuration, credential rules and shared models
//!
//! This crate defines the pieces shared by the server and the client:
//! - Configuration management
//! - Email and password format rules
//! - The `User` record kept by the credential store

pub mod config;
pub mod validation;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, Environment, LoggingConfig,
    PasswordConfig, RateLimitConfig, ServerConfig, StoreBackend,
};
pub use validation::{
    normalize_email, validate_email, validate_password, validate_registration, ValidationError,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// User Model
// ============================================================================

/// A stored account
///
/// At most one refresh token is active per user: issuing a new one replaces
/// the previous value, and logging out clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier, used as the `sub` claim of issued tokens
    pub id: Uuid,
    /// Lowercased, unique email address
    pub email: String,
    /// Argon2 PHC string; never the plaintext password
    pub password_hash: String,
    /// Currently active refresh token, if any
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a new account record with a fresh id
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            refresh_token: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the refresh token to store alongside the record
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Whether `token` is this user's active refresh token
    pub fn holds_refresh_token(&self, token: &str) -> bool {
        self.refresh_token.as_deref() == Some(token)
    }
}
