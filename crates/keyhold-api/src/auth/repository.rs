//! Credential store
//!
//! The auth service only needs to read and write single user records by
//! email, by id or by the value of their active refresh token. That surface
//! is the [`UserRepository`] trait, with two implementations:
//! - [`PgUserRepository`]: PostgreSQL through sqlx, unique index on email
//! - [`MemoryUserRepository`]: process-local map for development and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyhold_core::User;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::EmailAlreadyExists
            }
            _ => RepositoryError::DatabaseError(err.to_string()),
        }
    }
}

/// Single-record access to stored users
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; fails with `EmailAlreadyExists` on a duplicate email
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Find the user whose active refresh token equals `token`
    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError>;

    /// Replace (or clear, with `None`) the user's active refresh token
    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<(), RepositoryError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        refresh_token TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_REFRESH_TOKEN_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS users_refresh_token_idx ON users (refresh_token)";

const USER_COLUMNS: &str = "id, email, password_hash, refresh_token, created_at";

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL user repository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Connect to PostgreSQL
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                RepositoryError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the users table and its indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_REFRESH_TOKEN_INDEX)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, refresh_token, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE refresh_token = $1 LIMIT 1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory user repository
///
/// Enforces the same unique-email rule as the database. Contents are lost
/// when the process exits.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::EmailAlreadyExists);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.holds_refresh_token(token)).cloned())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::UserNotFound)?;
        user.refresh_token = token.map(str::to_string);
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = MemoryUserRepository::new();
        let user = User::new("a@x.com", "hash").with_refresh_token("r1");
        repo.create(&user).await.unwrap();

        assert_eq!(repo.find_by_email("a@x.com").await.unwrap(), Some(user.clone()));
        assert_eq!(repo.find_by_id(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            repo.find_by_refresh_token("r1").await.unwrap(),
            Some(user.clone())
        );
        assert!(repo.find_by_email("A@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = MemoryUserRepository::new();
        let first = User::new("a@x.com", "hash1");
        repo.create(&first).await.unwrap();

        let second = User::new("a@x.com", "hash2");
        assert!(matches!(
            repo.create(&second).await,
            Err(RepositoryError::EmailAlreadyExists)
        ));

        // The original record is untouched
        let stored = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.password_hash, "hash1");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_refresh_token_replaces_previous() {
        let repo = MemoryUserRepository::new();
        let user = User::new("a@x.com", "hash").with_refresh_token("old");
        repo.create(&user).await.unwrap();

        repo.set_refresh_token(user.id, Some("new")).await.unwrap();
        assert!(repo.find_by_refresh_token("old").await.unwrap().is_none());
        assert!(repo.find_by_refresh_token("new").await.unwrap().is_some());

        repo.set_refresh_token(user.id, None).await.unwrap();
        assert!(repo.find_by_refresh_token("new").await.unwrap().is_none());
        assert!(repo
            .find_by_id(user.id)
            .await
            .unwrap()
            .unwrap()
            .refresh_token
            .is_none());
    }

    #[tokio::test]
    async fn test_set_refresh_token_unknown_user() {
        let repo = MemoryUserRepository::new();
        let result = repo.set_refresh_token(Uuid::new_v4(), Some("t")).await;
        assert!(matches!(result, Err(RepositoryError::UserNotFound)));
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database at DATABASE_URL"]
    async fn test_postgres_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let repo = PgUserRepository::connect(&url, 2).await.unwrap();
        repo.migrate().await.unwrap();

        let email = format!("{}@example.com", Uuid::new_v4());
        let user = User::new(email.clone(), "hash").with_refresh_token("pg-token");
        repo.create(&user).await.unwrap();

        let found = repo.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let duplicate = User::new(email.clone(), "hash");
        assert!(matches!(
            repo.create(&duplicate).await,
            Err(RepositoryError::EmailAlreadyExists)
        ));

        repo.set_refresh_token(user.id, None).await.unwrap();
        assert!(repo.find_by_refresh_token("pg-token").await.unwrap().is_none());
    }
}
