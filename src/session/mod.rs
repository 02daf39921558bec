//! The inactivity session timer.
//!
//! After `inactivity_limit` without a qualifying input the user is warned, and if they do not
//! respond within `warning_duration` they are logged out. `IdleTimer` is the state machine and
//! `SessionWatcher` runs it on tokio timers.

mod timer;
mod watcher;

pub use timer::{IdleTimer, TimerCommand};
pub use watcher::{LogoutAction, SessionWatcher};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ten minutes.
pub const DEFAULT_INACTIVITY_LIMIT: Duration = Duration::from_secs(600);
pub const DEFAULT_WARNING_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Active,
    Warning,
    Expired,
}

serde_plain::derive_display_from_serialize!(SessionPhase);
serde_plain::derive_fromstr_from_deserialize!(SessionPhase);

/// What the user sees. `seconds_remaining` is zero outside of `Warning`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionTimerState {
    pub phase: SessionPhase,
    pub seconds_remaining: u64,
}

/// The input events that count as activity.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerMove,
    PointerPress,
    KeyPress,
    TouchStart,
    Scroll,
}

serde_plain::derive_display_from_serialize!(ActivityKind);
serde_plain::derive_fromstr_from_deserialize!(ActivityKind);

/// How ordinary activity is treated while the logout warning is showing.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningActivity {
    /// Only the explicit "stay logged in" action dismisses the warning.
    #[default]
    RequireConfirmation,
    /// Any qualifying input dismisses the warning as if "stay logged in" was chosen.
    ResetOnActivity,
}

serde_plain::derive_display_from_serialize!(WarningActivity);
serde_plain::derive_fromstr_from_deserialize!(WarningActivity);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimerSettings {
    pub inactivity_limit: Duration,
    pub warning_duration: Duration,
    pub warning_activity: WarningActivity,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_LIMIT, DEFAULT_WARNING_DURATION)
    }
}

impl TimerSettings {
    pub fn new(inactivity_limit: Duration, warning_duration: Duration) -> Self {
        Self {
            inactivity_limit,
            warning_duration,
            warning_activity: WarningActivity::default(),
        }
    }

    pub fn with_warning_activity(mut self, warning_activity: WarningActivity) -> Self {
        self.warning_activity = warning_activity;
        self
    }

    /// Time from the last qualifying input until the warning appears.
    pub fn warning_delay(&self) -> Duration {
        self.inactivity_limit.saturating_sub(self.warning_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_settings() {
        let s = TimerSettings::default();
        assert_eq!(s.warning_delay(), Duration::from_secs(570));
        assert_eq!(s.warning_activity, WarningActivity::RequireConfirmation);
    }

    #[test]
    fn test_enum_strings() {
        assert_eq!(SessionPhase::Warning.to_string(), "warning");
        assert_eq!(ActivityKind::from_str("key_press").unwrap(), ActivityKind::KeyPress);
        assert_eq!(
            WarningActivity::from_str("reset_on_activity").unwrap(),
            WarningActivity::ResetOnActivity
        );
        assert!(WarningActivity::from_str("sometimes").is_err());
    }
}
