//! Authentication module
//!
//! JWT-based authentication with the following components:
//! - Access/refresh token issuance and validation
//! - Password hashing with Argon2
//! - Credential store (PostgreSQL or in-memory)
//! - Authentication service for register/login/refresh/logout
//! - Middleware for access-token protected routes

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{Claims, JwtError, TokenIssuer, TokenKind, TokenPair};
pub use middleware::{require_access_token, AuthenticatedUser};
pub use password::{hash_password, verify_password, PasswordError};
pub use repository::{MemoryUserRepository, PgUserRepository, RepositoryError, UserRepository};
pub use service::AuthService;
