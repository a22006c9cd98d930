//! Credential format rules
//!
//! The same rules run on the server before an account is created and in the
//! client before a form is submitted, so both sides agree on what a valid
//! email address and a strong enough password look like.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Symbols a password may contain; at least one is required
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*";

/// Minimum password length
pub const PASSWORD_MIN_LEN: usize = 8;

/// Longest email address accepted by the client forms (RFC 5321 path limit)
pub const EMAIL_MAX_LEN: usize = 254;

/// Longest password accepted by the client forms
pub const PASSWORD_MAX_LEN: usize = 128;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is valid")
});

// The character class half of the password rule; the digit and symbol
// requirements are checked separately since `regex` has no lookahead.
static PASSWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9!@#$%^&*]{8,}$").expect("password pattern is valid"));

/// Credential validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least 8 characters long and include at least one number and one special character")]
    WeakPassword,
}

/// Lowercase an email address the way it is stored
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Check an email address against the accepted pattern
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Check password strength
///
/// A password is accepted when it:
/// - is at least 8 characters long
/// - uses only ASCII letters, digits and `!@#$%^&*`
/// - contains at least one digit
/// - contains at least one of `!@#$%^&*`
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let strong = PASSWORD_RE.is_match(password)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if strong {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

/// Normalize and validate a registration pair, returning the email to store
pub fn validate_registration(email: &str, password: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email);
    validate_email(&email)?;
    validate_password(password)?;
    Ok(email)
}
