//! The inactivity state machine.
//!
//! `IdleTimer` owns no clocks. Every event returns the `TimerCommand`s the caller must carry out,
//! and the caller reports back when a scheduled warning comes due or a tick elapses. This keeps
//! every transition testable without sleeping.

use crate::session::{ActivityKind, SessionPhase, SessionTimerState, TimerSettings, WarningActivity};
use std::time::Duration;
use tracing::{debug, info};

/// A side effect requested by the state machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimerCommand {
    /// Arm the one-shot "enter warning" timer, replacing any pending one.
    ScheduleWarning(Duration),
    /// Disarm the one-shot timer.
    CancelWarning,
    /// Start the repeating one-second countdown tick.
    StartTicks,
    /// Stop the countdown tick.
    CancelTicks,
    /// Sign the user out. Issued at most once per timer.
    Logout,
}

use TimerCommand::*;

#[derive(Debug, Clone)]
pub struct IdleTimer {
    settings: TimerSettings,
    phase: SessionPhase,
    seconds_remaining: u64,
}

impl IdleTimer {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            phase: SessionPhase::Active,
            seconds_remaining: 0,
        }
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> SessionTimerState {
        SessionTimerState {
            phase: self.phase,
            seconds_remaining: match self.phase {
                SessionPhase::Warning => self.seconds_remaining,
                _ => 0,
            },
        }
    }

    /// Arms the idle clock for a freshly started session.
    pub fn start(&mut self) -> Vec<TimerCommand> {
        match self.phase {
            SessionPhase::Active => vec![ScheduleWarning(self.settings.warning_delay())],
            _ => Vec::new(),
        }
    }

    /// A qualifying input event.
    pub fn on_activity(&mut self, kind: ActivityKind) -> Vec<TimerCommand> {
        match self.phase {
            SessionPhase::Active => {
                debug!("{kind} resets the idle clock");
                vec![
                    CancelWarning,
                    ScheduleWarning(self.settings.warning_delay()),
                ]
            }
            SessionPhase::Warning => match self.settings.warning_activity {
                WarningActivity::RequireConfirmation => {
                    debug!("{kind} ignored while the logout warning is showing");
                    Vec::new()
                }
                WarningActivity::ResetOnActivity => self.stay_logged_in(),
            },
            SessionPhase::Expired => Vec::new(),
        }
    }

    /// The one-shot timer fired.
    pub fn on_warning_due(&mut self) -> Vec<TimerCommand> {
        if self.phase != SessionPhase::Active {
            return Vec::new();
        }
        let warning_secs = self.settings.warning_duration.as_secs();
        if warning_secs == 0 {
            return self.expire(vec![CancelWarning]);
        }
        info!("No activity, logging out in {warning_secs} seconds unless you choose to stay");
        self.phase = SessionPhase::Warning;
        self.seconds_remaining = warning_secs;
        vec![CancelWarning, StartTicks]
    }

    /// One second of the countdown elapsed.
    pub fn on_tick(&mut self) -> Vec<TimerCommand> {
        if self.phase != SessionPhase::Warning {
            return Vec::new();
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            return self.expire(vec![CancelTicks]);
        }
        Vec::new()
    }

    /// The "stay logged in" button.
    pub fn stay_logged_in(&mut self) -> Vec<TimerCommand> {
        if self.phase != SessionPhase::Warning {
            return Vec::new();
        }
        info!("Staying logged in");
        self.phase = SessionPhase::Active;
        self.seconds_remaining = 0;
        vec![CancelTicks, ScheduleWarning(self.settings.warning_delay())]
    }

    /// The "logout now" button.
    pub fn logout_now(&mut self) -> Vec<TimerCommand> {
        match self.phase {
            SessionPhase::Expired => Vec::new(),
            _ => self.expire(vec![CancelWarning, CancelTicks]),
        }
    }

    /// Teardown. Disarms everything without logging out.
    pub fn shutdown(&mut self) -> Vec<TimerCommand> {
        vec![CancelWarning, CancelTicks]
    }

    fn expire(&mut self, mut commands: Vec<TimerCommand>) -> Vec<TimerCommand> {
        info!("Session expired");
        self.phase = SessionPhase::Expired;
        self.seconds_remaining = 0;
        commands.push(Logout);
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(limit: u64, warning: u64) -> TimerSettings {
        TimerSettings::new(Duration::from_secs(limit), Duration::from_secs(warning))
    }

    fn warned(limit: u64, warning: u64) -> IdleTimer {
        let mut t = IdleTimer::new(settings(limit, warning));
        t.start();
        t.on_warning_due();
        t
    }

    fn logouts(commands: &[TimerCommand]) -> usize {
        commands.iter().filter(|c| **c == Logout).count()
    }

    #[test]
    fn test_start_schedules_warning_before_limit() {
        let mut t = IdleTimer::new(settings(600, 30));
        assert_eq!(t.start(), vec![ScheduleWarning(Duration::from_secs(570))]);
        assert_eq!(t.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_warning_due_enters_warning_with_full_countdown() {
        let mut t = IdleTimer::new(settings(600, 30));
        t.start();
        assert_eq!(t.on_warning_due(), vec![CancelWarning, StartTicks]);
        assert_eq!(
            t.state(),
            SessionTimerState {
                phase: SessionPhase::Warning,
                seconds_remaining: 30
            }
        );
    }

    #[test]
    fn test_activity_reschedules_while_active() {
        let mut t = IdleTimer::new(settings(600, 30));
        t.start();
        assert_eq!(
            t.on_activity(ActivityKind::KeyPress),
            vec![CancelWarning, ScheduleWarning(Duration::from_secs(570))]
        );
        assert_eq!(t.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_last_tick_expires_and_logs_out_once() {
        let mut t = warned(600, 30);
        for _ in 0..29 {
            assert!(t.on_tick().is_empty());
        }
        assert_eq!(t.state().seconds_remaining, 1);
        let commands = t.on_tick();
        assert_eq!(commands, vec![CancelTicks, Logout]);
        assert_eq!(logouts(&commands), 1);
        assert_eq!(t.phase(), SessionPhase::Expired);

        // Stray events after expiry do nothing.
        assert!(t.on_tick().is_empty());
        assert!(t.on_warning_due().is_empty());
        assert!(t.on_activity(ActivityKind::PointerMove).is_empty());
        assert!(t.stay_logged_in().is_empty());
        assert!(t.logout_now().is_empty());
    }

    #[test]
    fn test_stay_returns_to_active_without_logout() {
        let mut t = warned(600, 30);
        for _ in 0..15 {
            t.on_tick();
        }
        assert_eq!(t.state().seconds_remaining, 15);
        let commands = t.stay_logged_in();
        assert_eq!(
            commands,
            vec![CancelTicks, ScheduleWarning(Duration::from_secs(570))]
        );
        assert_eq!(logouts(&commands), 0);
        assert_eq!(t.state(), SessionTimerState::default());
    }

    #[test]
    fn test_stay_is_ignored_when_active() {
        let mut t = IdleTimer::new(settings(600, 30));
        t.start();
        assert!(t.stay_logged_in().is_empty());
    }

    #[test]
    fn test_activity_during_warning_requires_confirmation_by_default() {
        let mut t = warned(600, 30);
        assert!(t.on_activity(ActivityKind::Scroll).is_empty());
        assert_eq!(t.phase(), SessionPhase::Warning);
    }

    #[test]
    fn test_activity_during_warning_can_reset() {
        let mut s = settings(600, 30);
        s.warning_activity = WarningActivity::ResetOnActivity;
        let mut t = IdleTimer::new(s);
        t.start();
        t.on_warning_due();
        assert_eq!(
            t.on_activity(ActivityKind::TouchStart),
            vec![CancelTicks, ScheduleWarning(Duration::from_secs(570))]
        );
        assert_eq!(t.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_logout_now_cancels_everything() {
        let mut t = warned(600, 30);
        let commands = t.logout_now();
        assert_eq!(commands, vec![CancelWarning, CancelTicks, Logout]);
        assert_eq!(t.phase(), SessionPhase::Expired);
    }

    #[test]
    fn test_zero_warning_expires_immediately() {
        let mut t = IdleTimer::new(settings(60, 0));
        assert_eq!(t.start(), vec![ScheduleWarning(Duration::from_secs(60))]);
        assert_eq!(t.on_warning_due(), vec![CancelWarning, Logout]);
        assert_eq!(t.phase(), SessionPhase::Expired);
    }

    #[test]
    fn test_warning_longer_than_limit_saturates() {
        let mut t = IdleTimer::new(settings(10, 30));
        assert_eq!(t.start(), vec![ScheduleWarning(Duration::ZERO)]);
    }

    #[test]
    fn test_tick_outside_warning_is_ignored() {
        let mut t = IdleTimer::new(settings(600, 30));
        t.start();
        assert!(t.on_tick().is_empty());
        assert_eq!(t.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_shutdown_disarms() {
        let mut t = warned(600, 30);
        assert_eq!(t.shutdown(), vec![CancelWarning, CancelTicks]);
    }
}
