//! Login and registration forms
//!
//! Each form owns its inputs and a [`FormState`]:
//!
//! ```text
//! Idle -> Submitting -> Success
//!                   \-> Error
//! ```
//!
//! Input is sanitized as it is set and validated before anything is sent,
//! so a form with bad input never reaches the network.

use crate::client::AuthClient;
use crate::error::FormError;
use crate::storage::TokenStore;
use keyhold_core::validation::{EMAIL_MAX_LEN, PASSWORD_MAX_LEN};
use keyhold_core::{normalize_email, validate_email, validate_password};
use std::fmt;

/// Form inputs that can carry an error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Email,
    Password,
    RepeatPassword,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Email => write!(f, "email"),
            Field::Password => write!(f, "password"),
            Field::RepeatPassword => write!(f, "repeatPassword"),
        }
    }
}

/// Which form an error response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Login,
    Register,
}

/// Submission state of a form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormState {
    #[default]
    Idle,
    Submitting,
    Success,
    Error(Vec<FormError>),
}

impl FormState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, FormState::Submitting)
    }

    /// Errors to display, empty unless in the `Error` state
    pub fn errors(&self) -> &[FormError] {
        match self {
            FormState::Error(errors) => errors,
            _ => &[],
        }
    }

    /// Move to `Submitting`; refused while a submission is already running
    pub fn begin(&mut self) -> Result<(), FormError> {
        if self.is_submitting() {
            return Err(FormError::General(
                "A submission is already in progress".to_string(),
            ));
        }
        *self = FormState::Submitting;
        Ok(())
    }

    pub fn succeed(&mut self) {
        *self = FormState::Success;
    }

    pub fn fail(&mut self, errors: Vec<FormError>) {
        *self = FormState::Error(errors);
    }

    pub fn reset(&mut self) {
        *self = FormState::Idle;
    }
}

/// A request in flight for a form
///
/// Dropping it before [`InFlight::finish`] (the submit future was cancelled)
/// puts the form back to `Idle` so it can be submitted again.
struct InFlight<'a> {
    state: &'a mut FormState,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a mut FormState) -> Self {
        Self { state }
    }

    fn finish(self, outcome: Result<(), FormError>) {
        match outcome {
            Ok(()) => self.state.succeed(),
            Err(error) => self.state.fail(vec![error]),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.state.is_submitting() {
            tracing::debug!("submission cancelled, form reset");
            self.state.reset();
        }
    }
}

/// Trim, drop control characters and cap the length in characters
pub fn sanitize_input(value: &str, max_len: usize) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect()
}

pub fn sanitize_email(value: &str) -> String {
    normalize_email(&sanitize_input(value, EMAIL_MAX_LEN))
}

pub fn sanitize_password(value: &str) -> String {
    sanitize_input(value, PASSWORD_MAX_LEN)
}

fn check_email(email: &str, errors: &mut Vec<FormError>) {
    if email.is_empty() {
        errors.push(FormError::field(Field::Email, "Email is required"));
    } else if let Err(e) = validate_email(email) {
        errors.push(FormError::field(Field::Email, e.to_string()));
    }
}

fn finish(errors: Vec<FormError>) -> Result<(), Vec<FormError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Email and password login
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    email: String,
    password: String,
    state: FormState,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&mut self, value: &str) {
        self.email = sanitize_email(value);
    }

    pub fn set_password(&mut self, value: &str) {
        self.password = sanitize_password(value);
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Check the inputs without touching the network
    pub fn validate(&self) -> Result<(), Vec<FormError>> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.push(FormError::field(Field::Password, "Password is required"));
        }
        finish(errors)
    }

    /// Validate, then log in and store the issued tokens
    pub async fn submit<S: TokenStore>(&mut self, client: &AuthClient<S>) -> &FormState {
        if let Err(e) = self.state.begin() {
            tracing::debug!(error = %e, "login submit ignored");
            return &self.state;
        }

        if let Err(errors) = self.validate() {
            self.state.fail(errors);
            return &self.state;
        }

        let in_flight = InFlight::new(&mut self.state);
        let outcome = client
            .login(&self.email, &self.password)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(error = %e, "login failed");
                FormError::from_client_error(FormKind::Login, &e)
            });
        in_flight.finish(outcome);
        &self.state
    }
}

/// Account registration with a repeated password
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    email: String,
    password: String,
    repeat_password: String,
    state: FormState,
}

impl RegisterForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&mut self, value: &str) {
        self.email = sanitize_email(value);
    }

    pub fn set_password(&mut self, value: &str) {
        self.password = sanitize_password(value);
    }

    pub fn set_repeat_password(&mut self, value: &str) {
        self.repeat_password = sanitize_password(value);
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Check the inputs without touching the network
    ///
    /// Uses the same email and password rules the server enforces.
    pub fn validate(&self) -> Result<(), Vec<FormError>> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);

        if self.password.is_empty() {
            errors.push(FormError::field(Field::Password, "Password is required"));
        } else if let Err(e) = validate_password(&self.password) {
            errors.push(FormError::field(Field::Password, e.to_string()));
        }

        if self.repeat_password.is_empty() {
            errors.push(FormError::field(
                Field::RepeatPassword,
                "Please confirm your password",
            ));
        } else if self.repeat_password != self.password {
            errors.push(FormError::field(
                Field::RepeatPassword,
                "Passwords do not match",
            ));
        }

        finish(errors)
    }

    /// Validate, then register and store the issued tokens
    ///
    /// The repeated password is never sent.
    pub async fn submit<S: TokenStore>(&mut self, client: &AuthClient<S>) -> &FormState {
        if let Err(e) = self.state.begin() {
            tracing::debug!(error = %e, "register submit ignored");
            return &self.state;
        }

        if let Err(errors) = self.validate() {
            self.state.fail(errors);
            return &self.state;
        }

        let in_flight = InFlight::new(&mut self.state);
        let outcome = client
            .register(&self.email, &self.password)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(error = %e, "registration failed");
                FormError::from_client_error(FormKind::Register, &e)
            });
        in_flight.finish(outcome);
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStore;
    use std::time::Duration;

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("  abc\u{0}\u{7}def \n", 100), "abcdef");
        assert_eq!(sanitize_input("abcdef", 3), "abc");
        assert_eq!(sanitize_email("  User@Example.COM "), "user@example.com");

        let long = "a".repeat(PASSWORD_MAX_LEN + 10);
        assert_eq!(sanitize_password(&long).len(), PASSWORD_MAX_LEN);
    }

    #[test]
    fn test_state_transitions() {
        let mut state = FormState::default();
        assert_eq!(state, FormState::Idle);

        state.begin().unwrap();
        assert!(state.is_submitting());
        assert!(state.begin().is_err());

        state.fail(vec![FormError::Connectivity]);
        assert_eq!(state.errors(), &[FormError::Connectivity]);

        // Retrying after an error is allowed
        state.begin().unwrap();
        state.succeed();
        assert_eq!(state, FormState::Success);
        assert!(state.errors().is_empty());

        state.begin().unwrap();
        state.reset();
        assert_eq!(state, FormState::Idle);
    }

    #[test]
    fn test_login_validation() {
        let mut form = LoginForm::new();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 2);

        form.set_email("not-an-email");
        form.set_password("anything");
        let errors = form.validate().unwrap_err();
        assert_eq!(errors, vec![FormError::field(Field::Email, "Invalid email format")]);

        form.set_email("user@example.com");
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_register_validation() {
        let mut form = RegisterForm::new();
        form.set_email("user@example.com");
        form.set_password("weak");
        form.set_repeat_password("weak");
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field_name(), Some(Field::Password));

        form.set_password("password1!");
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![FormError::field(Field::RepeatPassword, "Passwords do not match")]
        );

        form.set_repeat_password("password1!");
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_form_never_sends() {
        // Nothing listens here; a request would surface as a connectivity error
        let client = AuthClient::new("http://127.0.0.1:9", MemoryTokenStore::new()).unwrap();

        let mut form = RegisterForm::new();
        form.set_email("bad");
        let state = form.submit(&client).await;

        assert!(matches!(state, FormState::Error(_)));
        assert!(!state.errors().contains(&FormError::Connectivity));
        assert!(state.errors().iter().all(|e| e.field_name().is_some()));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let client = AuthClient::new("http://127.0.0.1:9", MemoryTokenStore::new()).unwrap();

        let mut form = LoginForm::new();
        form.set_email("user@example.com");
        form.set_password("password1!");
        let state = form.submit(&client).await;

        assert_eq!(state.errors(), &[FormError::Connectivity]);
    }

    #[tokio::test]
    async fn test_cancelled_submit_can_retry() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let client = AuthClient::new(format!("http://{addr}"), MemoryTokenStore::new()).unwrap();

        let mut login = LoginForm::new();
        login.set_email("user@example.com");
        login.set_password("password1!");
        let cancelled = tokio::time::timeout(Duration::from_millis(200), login.submit(&client)).await;
        assert!(cancelled.is_err());
        assert_eq!(login.state(), &FormState::Idle);

        let mut register = RegisterForm::new();
        register.set_email("user@example.com");
        register.set_password("password1!");
        register.set_repeat_password("password1!");
        let cancelled =
            tokio::time::timeout(Duration::from_millis(200), register.submit(&client)).await;
        assert!(cancelled.is_err());
        assert_eq!(register.state(), &FormState::Idle);

        server.abort();
        let _ = server.await;

        // The retry reaches the network instead of being refused as in progress
        let state = login.submit(&client).await;
        assert_eq!(state.errors(), &[FormError::Connectivity]);
    }
}
