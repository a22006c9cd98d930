//! # API Client
//!
//! HTTP client for the Keyhold authentication endpoints.

use crate::error::{ClientError, ClientResult};
use crate::storage::{StoredTokens, TokenStore};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// Tokens returned by register and login
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    #[serde(default)]
    pub message: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&AuthTokens> for StoredTokens {
    fn from(tokens: &AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        }
    }
}

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

// Auth errors carry `message`; the rate limiter answers with `error`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// HTTP client for the Keyhold API
///
/// Every call that yields tokens saves them to the [`TokenStore`]; calls that
/// need tokens read them from there.
pub struct AuthClient<S> {
    base_url: String,
    http: Client,
    store: S,
}

impl<S: TokenStore> AuthClient<S> {
    /// Creates a client for the API at `base_url`
    pub fn new(base_url: impl Into<String>, store: S) -> ClientResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account; the email must already be sanitized
    pub async fn register(&self, email: &str, password: &str) -> ClientResult<AuthTokens> {
        let res = self
            .http
            .post(self.url("/auth/register"))
            .json(&CredentialsBody { email, password })
            .send()
            .await?;

        let tokens: AuthTokens = parse(res).await?;
        self.store.save(&StoredTokens::from(&tokens)).await?;
        tracing::info!("registered and stored tokens");
        Ok(tokens)
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthTokens> {
        let res = self
            .http
            .post(self.url("/auth/login"))
            .json(&CredentialsBody { email, password })
            .send()
            .await?;

        let tokens: AuthTokens = parse(res).await?;
        self.store.save(&StoredTokens::from(&tokens)).await?;
        tracing::info!("logged in and stored tokens");
        Ok(tokens)
    }

    /// Exchange the stored refresh token for a new pair
    ///
    /// The server rotates the refresh token, so the new pair replaces the old
    /// one in storage.
    pub async fn refresh(&self) -> ClientResult<StoredTokens> {
        let current = self.stored().await?;

        let res = self
            .http
            .post(self.url("/auth/refresh-token"))
            .json(&RefreshTokenBody {
                refresh_token: &current.refresh_token,
            })
            .send()
            .await?;

        let tokens: StoredTokens = parse(res).await?;
        self.store.save(&tokens).await?;
        tracing::debug!("tokens refreshed");
        Ok(tokens)
    }

    /// Revoke the stored refresh token
    ///
    /// Local tokens are cleared whatever the server answers.
    pub async fn logout(&self) -> ClientResult<String> {
        let current = self.stored().await?;

        let result: ClientResult<MessageBody> = async {
            let res = self
                .http
                .post(self.url("/auth/logout"))
                .json(&RefreshTokenBody {
                    refresh_token: &current.refresh_token,
                })
                .send()
                .await?;
            parse::<MessageBody>(res).await
        }
        .await;

        self.store.clear().await?;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "server-side logout failed, local tokens cleared");
        }
        Ok(result?.message)
    }

    /// Fetch the account behind the stored access token
    pub async fn me(&self) -> ClientResult<Profile> {
        let current = self.stored().await?;

        let res = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(&current.access_token)
            .send()
            .await?;

        parse(res).await
    }

    /// Checks if the server is reachable and healthy
    pub async fn health(&self) -> ClientResult<bool> {
        let res = self.http.get(self.url("/health")).send().await?;
        Ok(res.status().is_success())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn stored(&self) -> ClientResult<StoredTokens> {
        self.store
            .load()
            .await?
            .ok_or(ClientError::NotAuthenticated)
    }
}

async fn parse<T: DeserializeOwned>(res: Response) -> ClientResult<T> {
    let status = res.status();
    if !status.is_success() {
        let message = res
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message.or(body.error));
        return Err(ClientError::Server { status, message });
    }

    res.json()
        .await
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
