//! Client error types
//!
//! [`ClientError`] is what the HTTP layer returns. Forms turn it into a
//! [`FormError`], the message a user actually sees.

use crate::form::{Field, FormKind};
use crate::storage::StorageError;
use reqwest::StatusCode;
use thiserror::Error;

/// Shown when the server could not be reached at all
pub const CONNECTIVITY_MESSAGE: &str = "Connection error. Check your internet connection.";

/// Fallback when the server gives no usable message
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors from API calls
#[derive(Error, Debug)]
pub enum ClientError {
    /// No response was received
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server error: {status} - {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    /// Success status but the body was not what the API documents
    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("token storage error: {0}")]
    Storage(#[from] StorageError),

    /// The call needs stored tokens and there are none
    #[error("not logged in")]
    NotAuthenticated,
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// A message to display on a form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// Attached to a single input
    #[error("{field}: {message}")]
    Field { field: Field, message: String },

    /// Shown above or below the whole form
    #[error("{0}")]
    General(String),

    #[error("Connection error. Check your internet connection.")]
    Connectivity,
}

impl FormError {
    pub fn field(field: Field, message: impl Into<String>) -> Self {
        Self::Field {
            field,
            message: message.into(),
        }
    }

    /// Map an error response to what the given form shows
    ///
    /// 404, 400 and 409 point at a specific input. Anything else is a general
    /// message, preferring the text the server sent.
    pub fn from_status(form: FormKind, status: StatusCode, message: Option<&str>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());

        match (form, status.as_u16()) {
            (_, 404) => Self::field(Field::Email, "No account found with this email"),
            (_, 409) => Self::field(Field::Email, "This email is already registered"),
            (FormKind::Login, 400) => {
                Self::field(Field::Password, message.unwrap_or("Invalid credentials"))
            }
            (FormKind::Register, 400) => match message {
                Some(m) if m.to_lowercase().contains("password") => Self::field(Field::Password, m),
                Some(m) => Self::field(Field::Email, m),
                None => Self::field(Field::Email, "Please check your email and password"),
            },
            (_, 429) => Self::General(
                message
                    .unwrap_or("Too many attempts. Please wait and try again.")
                    .to_string(),
            ),
            _ => Self::General(message.unwrap_or(GENERIC_MESSAGE).to_string()),
        }
    }

    /// Map any client failure to what the given form shows
    pub fn from_client_error(form: FormKind, err: &ClientError) -> Self {
        match err {
            ClientError::Network(_) => Self::Connectivity,
            ClientError::Server { status, message } => {
                Self::from_status(form, *status, message.as_deref())
            }
            ClientError::InvalidResponse(_) => {
                Self::General("Incomplete response from server".to_string())
            }
            ClientError::Storage(_) => {
                Self::General("Could not save your session on this device".to_string())
            }
            ClientError::NotAuthenticated => Self::General("Please log in first".to_string()),
        }
    }

    /// The input this message belongs to, if any
    pub fn field_name(&self) -> Option<Field> {
        match self {
            Self::Field { field, .. } => Some(*field),
            _ => None,
        }
    }
}
