//! `bloom watch`: the inactivity timer driven from the terminal.

use crate::api::AuthSession;
use crate::commands::{require_user, Out};
use crate::error::{ErrorType, IntoResult};
use crate::session::{ActivityKind, LogoutAction, SessionPhase, SessionTimerState, SessionWatcher};
use crate::{Config, Result};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Signs out by deleting the saved session.
struct ClearSession {
    path: PathBuf,
}

#[async_trait]
impl LogoutAction for ClearSession {
    async fn logout(&self) -> Result<()> {
        if let Some(session) = AuthSession::clear(&self.path).await? {
            debug!("Cleared the session for {}", session.email());
        }
        Ok(())
    }
}

/// Handles `bloom watch`. Each line read from stdin is activity. When the warning shows, `stay`
/// keeps the session and `logout` ends it at once. Closing stdin stops watching without signing out.
pub async fn watch(config: &Config) -> Result<Out<SessionTimerState>> {
    watch_input(config, BufReader::new(tokio::io::stdin())).await
}

async fn watch_input<R>(config: &Config, input: R) -> Result<Out<SessionTimerState>>
where
    R: AsyncBufRead + Unpin,
{
    let session = require_user(config).await?;
    let settings = config.timer_settings();
    info!(
        "Watching {} for inactivity, sign out after {} seconds",
        session.email(),
        settings.inactivity_limit.as_secs()
    );
    let watcher = SessionWatcher::start(
        settings,
        Arc::new(ClearSession {
            path: config.session_path(),
        }),
    );
    let mut state = watcher.subscribe();
    let mut lines = input.lines();
    let mut previous = SessionPhase::Active;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line
                    .context("Unable to read from stdin")
                    .pub_result(ErrorType::Request)?;
                match line {
                    Some(line) => on_line(&watcher, &line),
                    None => break,
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                announce(previous, current);
                previous = current.phase;
                if current.phase == SessionPhase::Expired {
                    break;
                }
            }
        }
    }

    watcher.shutdown().await?;
    let last = *state.borrow();
    let message = match last.phase {
        SessionPhase::Expired => format!("Signed out {}", session.email()),
        _ => format!("Stopped watching, {} is still signed in", session.email()),
    };
    Ok(Out::new(message, last))
}

fn on_line(watcher: &SessionWatcher, line: &str) {
    match line.trim().to_lowercase().as_str() {
        "stay" => watcher.stay_logged_in(),
        "logout" => watcher.logout_now(),
        _ => watcher.record_activity(ActivityKind::KeyPress),
    }
}

fn announce(previous: SessionPhase, current: SessionTimerState) {
    match (previous, current.phase) {
        (SessionPhase::Active, SessionPhase::Warning) => warn!(
            "You will be signed out in {} seconds. Type 'stay' to remain signed in or 'logout' \
            to sign out now",
            current.seconds_remaining
        ),
        (SessionPhase::Warning, SessionPhase::Warning) => {
            info!("Signing out in {} seconds", current.seconds_remaining)
        }
        (SessionPhase::Warning, SessionPhase::Active) => info!("You are still signed in"),
        (_, SessionPhase::Expired) => warn!("Signed out due to inactivity or by request"),
        _ => {}
    }
}
