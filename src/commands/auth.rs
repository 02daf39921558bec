//! Sign-in command handlers.
//!
//! This module implements the CLI commands for:
//! - `bloom login` - Sign in and save the session
//! - `bloom logout` - Forget the saved session
//! - `bloom whoami` - Report the signed-in user
//!
//! It also holds the gate that every data command passes through.

use crate::api::{self, is_valid_email, AuthSession, Bloom};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Error, Mode, Result};
use anyhow::{anyhow, bail, ensure};
use serde::Serialize;
use tracing::debug;

/// The signed-in user as reported by `login` and `whoami`.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct SignedIn {
    pub user_id: String,
    pub email: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<&AuthSession> for SignedIn {
    fn from(session: &AuthSession) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            email: session.email().to_string(),
            expires_at: session.expires_at(),
        }
    }
}

/// Handles the `bloom login` command.
///
/// The email address is checked locally before anything is sent. On success the session is saved
/// to `$BLOOM_HOME/.secrets/session.json`.
///
/// # Errors
/// Returns an `auth` error carrying the provider's message if the sign-in is rejected.
pub async fn login(config: &Config, mode: Mode, email: &str, password: &str) -> Result<Out<SignedIn>> {
    let session = sign_in(config, mode, email, password)
        .await
        .map_err(login_failed)
        .pub_result(ErrorType::Auth)?;
    session
        .save(&config.session_path())
        .await
        .pub_result(ErrorType::Config)?;
    Ok(Out::new(
        format!("Signed in as {}", session.email()),
        SignedIn::from(&session),
    ))
}

/// Keeps the whole cause chain, e.g. the network error behind an unreachable provider.
fn login_failed(e: Error) -> Error {
    anyhow!("Login failed: {e:#}")
}

async fn sign_in(config: &Config, mode: Mode, email: &str, password: &str) -> Result<AuthSession> {
    let email = email.trim();
    ensure!(is_valid_email(email), "'{email}' is not a valid email address");
    ensure!(!password.is_empty(), "The password is empty");
    let provider = api::auth_provider(config, mode).await?;
    provider.sign_in(email, password).await
}

/// Handles the `bloom logout` command. Signing out when nobody is signed in is not an error.
pub async fn logout(config: &Config) -> Result<Out<()>> {
    let removed = AuthSession::clear(&config.session_path())
        .await
        .pub_result(ErrorType::Config)?;
    Ok(match removed {
        Some(session) => format!("Signed out {}", session.email()).into(),
        None => "Nobody was signed in".into(),
    })
}

/// Handles the `bloom whoami` command.
pub async fn whoami(config: &Config) -> Result<Out<SignedIn>> {
    let session = require_user(config).await?;
    Ok(Out::new(
        format!(
            "Signed in as {} until {}",
            session.email(),
            session.expires_at().format("%Y-%m-%d %H:%M UTC")
        ),
        SignedIn::from(&session),
    ))
}

/// Returns the saved session, or an `auth` error telling the user to sign in. Every command that
/// touches the data store goes through here first.
pub async fn require_user(config: &Config) -> Result<AuthSession> {
    check_session(AuthSession::load(&config.session_path()).await?).pub_result(ErrorType::Auth)
}

/// Requires a signed-in user and builds the data access on their behalf.
pub(super) async fn connect(config: &Config, mode: Mode) -> Result<Bloom> {
    let session = require_user(config).await?;
    api::bloom(config, mode, Some(&session))
        .await
        .pub_result(ErrorType::Config)
}

fn check_session(session: Option<AuthSession>) -> Result<AuthSession> {
    let Some(session) = session else {
        bail!("Not signed in, run 'bloom login'");
    };
    if session.is_expired() {
        debug!("The session for {} expired at {}", session.email(), session.expires_at());
        bail!("Your session has expired, run 'bloom login'");
    }
    Ok(session)
}
