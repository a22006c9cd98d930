//! Authentication service layer
//!
//! Business logic for registration, login, token refresh and logout on top
//! of the credential store, the password hasher and the token issuer.
//!
//! Each user holds a single active refresh token. Every successful register,
//! login or refresh overwrites it, so the previous value stops matching any
//! user and is rejected from then on.

use super::jwt::{Claims, TokenIssuer, TokenKind, TokenPair};
use super::password::{hash_password, verify_password, PasswordError};
use super::repository::{RepositoryError, UserRepository};
use crate::error::AuthError;
use keyhold_core::{validate_registration, AuthConfig, PasswordConfig, User};
use std::sync::Arc;
use uuid::Uuid;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenIssuer,
    password_config: PasswordConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(users: Arc<dyn UserRepository>, config: &AuthConfig) -> Self {
        Self {
            users,
            tokens: TokenIssuer::new(config),
            password_config: config.password.clone(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Register a new user
    ///
    /// The email is lowercased before validation and storage. The new record
    /// is written once, already holding its first refresh token.
    pub async fn register(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let email = validate_registration(email, password).map_err(|e| {
            tracing::debug!(error = %e, "registration rejected");
            AuthError::from(e)
        })?;

        if self.users.find_by_email(&email).await?.is_some() {
            tracing::warn!(email = %email, "registration for existing email");
            return Err(RepositoryError::EmailAlreadyExists.into());
        }

        let password_hash = self.hash(password).await?;
        let user = User::new(email, password_hash);
        let pair = self.tokens.issue_pair(user.id)?;
        let user = user.with_refresh_token(pair.refresh_token.clone());

        self.users.create(&user).await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok((user, pair))
    }

    /// Login with email and password
    ///
    /// The email must match the stored address exactly.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(AuthError::user_not_found)?;

        if !self.verify(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "login with invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.tokens.issue_pair(user.id)?;
        self.users
            .set_refresh_token(user.id, Some(&pair.refresh_token))
            .await?;
        user.refresh_token = Some(pair.refresh_token.clone());

        tracing::info!(user_id = %user.id, "user logged in");
        Ok((user, pair))
    }

    /// Exchange a refresh token for a new pair, rotating the stored token
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, AuthError> {
        let refresh_token = require_token(refresh_token)?;

        let user = self
            .users
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::warn!("refresh with unknown or revoked token");
                AuthError::invalid_refresh_token()
            })?;

        let claims = self
            .tokens
            .verify(TokenKind::Refresh, refresh_token)
            .map_err(|e| {
                tracing::warn!(user_id = %user.id, error = %e, "refresh token failed verification");
                AuthError::invalid_refresh_token()
            })?;

        if claims.user_id().ok() != Some(user.id) {
            tracing::warn!(user_id = %user.id, "refresh token subject mismatch");
            return Err(AuthError::invalid_refresh_token());
        }

        let pair = self.tokens.issue_pair(user.id)?;
        self.users
            .set_refresh_token(user.id, Some(&pair.refresh_token))
            .await?;

        tracing::debug!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke a refresh token
    ///
    /// Access tokens already handed out stay valid until they expire.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let refresh_token = require_token(refresh_token)?;

        let user = self
            .users
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(AuthError::invalid_refresh_token)?;

        self.users.set_refresh_token(user.id, None).await?;

        tracing::info!(user_id = %user.id, "user logged out");
        Ok(())
    }

    /// Validate an access token and return its claims
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self
            .tokens
            .verify(TokenKind::Access, access_token)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AuthError::invalid_access_token()
            })?;

        claims
            .user_id()
            .map_err(|_| AuthError::invalid_access_token())?;
        Ok(claims)
    }

    /// Look up the account behind an authenticated request
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(AuthError::user_not_found)
    }

    // Hashing and verification run on the blocking pool.
    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let config = self.password_config.clone();
        tokio::task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .map_err(AuthError::from)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
            .map_err(AuthError::from)
    }
}

fn require_token(token: Option<&str>) -> Result<&str, AuthError> {
    match token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::refresh_token_required()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repository::MemoryUserRepository;
    use tokio_test::assert_ok;

    fn service() -> AuthService {
        let config = AuthConfig {
            password: PasswordConfig::insecure_fast(),
            ..Default::default()
        };
        AuthService::new(Arc::new(MemoryUserRepository::new()), &config)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();

        let (user, pair) = auth.register("A@x.com", "Secret1!").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_ne!(user.password_hash, "Secret1!");

        let claims = auth.authenticate(&pair.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);

        let stored = auth.get_user(user.id).await.unwrap();
        assert!(stored.holds_refresh_token(&pair.refresh_token));

        let (logged_in, login_pair) = auth.login("a@x.com", "Secret1!").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(
            auth.authenticate(&login_pair.access_token)
                .unwrap()
                .user_id()
                .unwrap(),
            user.id
        );
    }

    #[tokio::test]
    async fn test_register_validation() {
        let auth = service();

        let err = auth.register("not-an-email", "Secret1!").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref m) if m == "Invalid email format"));

        let err = auth.register("a@x.com", "weakpass").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let auth = service();
        let (first, _) = auth.register("a@x.com", "Secret1!").await.unwrap();

        let err = auth.register("A@X.COM", "Other22@").await.unwrap_err();
        assert!(matches!(err, AuthError::Server(ref m) if m == "Email already registered"));

        let stored = auth.get_user(first.id).await.unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let auth = service();
        auth.register("a@x.com", "Secret1!").await.unwrap();

        assert!(matches!(
            auth.login("nobody@x.com", "Secret1!").await.unwrap_err(),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            auth.login("a@x.com", "Wrong123!").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn test_login_replaces_refresh_token() {
        let auth = service();
        let (_, registered) = auth.register("a@x.com", "Secret1!").await.unwrap();
        let (_, logged_in) = auth.login("a@x.com", "Secret1!").await.unwrap();

        assert!(matches!(
            auth.refresh(Some(&registered.refresh_token)).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));
        assert_ok!(auth.refresh(Some(&logged_in.refresh_token)).await);
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let auth = service();
        let (user, first) = auth.register("a@x.com", "Secret1!").await.unwrap();

        let second = auth.refresh(Some(&first.refresh_token)).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(auth
            .repository()
            .find_by_refresh_token(&first.refresh_token)
            .await
            .unwrap()
            .is_none());
        assert!(auth
            .get_user(user.id)
            .await
            .unwrap()
            .holds_refresh_token(&second.refresh_token));

        assert!(matches!(
            auth.refresh(Some(&first.refresh_token)).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let auth = service();
        assert!(matches!(
            auth.refresh(None).await.unwrap_err(),
            AuthError::MissingToken(_)
        ));
        assert!(matches!(
            auth.logout(Some("")).await.unwrap_err(),
            AuthError::MissingToken(_)
        ));
    }

    #[tokio::test]
    async fn test_stored_but_malformed_token_rejected() {
        let repo = Arc::new(MemoryUserRepository::new());
        let config = AuthConfig {
            password: PasswordConfig::insecure_fast(),
            ..Default::default()
        };
        let auth = AuthService::new(repo.clone(), &config);

        // A value that matches the stored field but is not a valid JWT
        let user = User::new("a@x.com", "hash").with_refresh_token("forged");
        repo.create(&user).await.unwrap();

        assert!(matches!(
            auth.refresh(Some("forged")).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));
        // The stored value is not rotated on failure
        assert!(auth.get_user(user.id).await.unwrap().holds_refresh_token("forged"));
    }

    #[tokio::test]
    async fn test_refresh_token_for_another_user_rejected() {
        let repo = Arc::new(MemoryUserRepository::new());
        let config = AuthConfig {
            password: PasswordConfig::insecure_fast(),
            ..Default::default()
        };
        let auth = AuthService::new(repo.clone(), &config);

        // Correctly signed, but its subject is someone else
        let other_id = Uuid::new_v4();
        let foreign = auth.tokens().issue(TokenKind::Refresh, other_id).unwrap();
        let user = User::new("a@x.com", "hash").with_refresh_token(&foreign);
        repo.create(&user).await.unwrap();

        assert!(matches!(
            auth.refresh(Some(&foreign)).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));
        assert!(auth.get_user(user.id).await.unwrap().holds_refresh_token(&foreign));
    }

    #[tokio::test]
    async fn test_logout_revokes() {
        let auth = service();
        let (user, pair) = auth.register("a@x.com", "Secret1!").await.unwrap();

        auth.logout(Some(&pair.refresh_token)).await.unwrap();
        assert!(auth.get_user(user.id).await.unwrap().refresh_token.is_none());

        assert!(matches!(
            auth.refresh(Some(&pair.refresh_token)).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));
        assert!(matches!(
            auth.logout(Some(&pair.refresh_token)).await.unwrap_err(),
            AuthError::InvalidToken(_)
        ));

        // Access tokens outlive the logout
        assert_ok!(auth.authenticate(&pair.access_token));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let auth = service();
        let (_, pair) = auth.register("a@x.com", "Secret1!").await.unwrap();
        assert!(matches!(
            auth.authenticate(&pair.refresh_token).unwrap_err(),
            AuthError::InvalidToken(_)
        ));
    }
}
