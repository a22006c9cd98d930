//! Keyhold Client - talks to the Keyhold API
//!
//! - [`AuthClient`]: typed HTTP calls for register, login, refresh, logout and profile
//! - [`LoginForm`] / [`RegisterForm`]: sanitize, validate and submit user input
//! - [`TokenStore`]: where the issued token pair is kept between runs

pub mod client;
pub mod error;
pub mod form;
pub mod storage;

pub use client::{AuthClient, AuthTokens, Profile};
pub use error::{ClientError, ClientResult, FormError};
pub use form::{Field, FormKind, FormState, LoginForm, RegisterForm};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, StoredTokens, TokenStore};
