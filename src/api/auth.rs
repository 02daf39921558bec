//! Email and password sign-in, and the session that is kept on disk afterwards.

use crate::api::File;
use crate::Result;
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

const SIGN_IN_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";

/// Id tokens last an hour unless the provider says otherwise.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

pub(crate) const DEMO_EMAIL: &str = "demo@example.com";
pub(crate) const DEMO_PASSWORD: &str = "password123";
pub(crate) const DEMO_USER_ID: &str = "demo-user";

/// Signs a user in with an email address and password.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
}

/// A signed-in user, as saved in `.secrets/session.json`.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    user_id: String,
    email: String,
    id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        id_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            id_token: id_token.into(),
            refresh_token,
            expires_at,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Reads the persisted session. No file means nobody is signed in.
    pub(crate) async fn load(path: &Path) -> Result<Option<Self>> {
        let file = File::<Self>::load_if_exists(path)
            .await
            .context("Unable to read the saved session")?;
        Ok(file.map(File::into_data))
    }

    pub(crate) async fn save(&self, path: &Path) -> Result<()> {
        File::new(path, self.clone())
            .save()
            .await
            .context("Unable to save the session")
    }

    /// Forgets the signed-in user. Returns the session that was removed, if any.
    pub(crate) async fn clear(path: &Path) -> Result<Option<Self>> {
        let Some(file) = File::<Self>::load_if_exists(path).await.ok().flatten() else {
            crate::utils::remove_file(path).await?;
            return Ok(None);
        };
        let session = file.data().clone();
        file.delete().await?;
        Ok(Some(session))
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// `something@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Password sign-in through the identity toolkit REST API.
pub(crate) struct FirebaseAuth {
    client: Client,
    api_key: String,
}

impl FirebaseAuth {
    pub(crate) fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

#[async_trait::async_trait]
impl AuthProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        ensure!(is_valid_email(email), "'{email}' is not a valid email address");
        debug!("Signing in {email}");
        let response = self
            .client
            .post(SIGN_IN_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .context("Unable to reach the authentication provider")?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("{message} ({status})");
        }

        let body: SignInResponse = response
            .json()
            .await
            .context("Unexpected sign-in response")?;
        let lifetime = body
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(AuthSession::new(
            body.local_id,
            body.email,
            body.id_token,
            body.refresh_token,
            Utc::now() + Duration::seconds(lifetime),
        ))
    }
}

/// Signs in the demo user without any network access.
#[derive(Debug, Default, Clone)]
pub(crate) struct TestAuth;

#[async_trait::async_trait]
impl AuthProvider for TestAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        ensure!(is_valid_email(email), "'{email}' is not a valid email address");
        if email != DEMO_EMAIL || password != DEMO_PASSWORD {
            bail!("INVALID_LOGIN_CREDENTIALS");
        }
        Ok(AuthSession::new(
            DEMO_USER_ID,
            DEMO_EMAIL,
            format!("test-token-{}", uuid::Uuid::new_v4()),
            None,
            Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
        ))
    }
}
