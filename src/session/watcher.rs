use crate::session::{
    ActivityKind, IdleTimer, SessionPhase, SessionTimerState, TimerCommand, TimerSettings,
};
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, Sleep};
use tracing::{debug, error, trace};

const TICK: Duration = Duration::from_secs(1);

/// Performs the sign-out when the session expires.
#[async_trait]
pub trait LogoutAction: Send + Sync {
    async fn logout(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Activity(ActivityKind),
    Stay,
    LogoutNow,
    Shutdown,
}

/// Runs an `IdleTimer` on a background task.
///
/// The task owns the state machine and its timers, so every event is handled in order and no
/// locking is needed. Dropping the watcher aborts the task and with it any pending timer.
pub struct SessionWatcher {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<SessionTimerState>,
    task: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    /// Starts the idle clock. Must be called from within a tokio runtime.
    pub fn start(settings: TimerSettings, logout: Arc<dyn LogoutAction>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionTimerState::default());
        let task = tokio::spawn(run(IdleTimer::new(settings), events_rx, state_tx, logout));
        Self {
            events: events_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    pub fn record_activity(&self, kind: ActivityKind) {
        self.send(Event::Activity(kind));
    }

    pub fn stay_logged_in(&self) {
        self.send(Event::Stay);
    }

    pub fn logout_now(&self) {
        self.send(Event::LogoutNow);
    }

    pub fn state(&self) -> SessionTimerState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionTimerState> {
        self.state.clone()
    }

    /// Resolves once the session has expired and the logout action has been run.
    pub async fn expired(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| s.phase == SessionPhase::Expired)
            .await
            .context("The session watcher stopped before the session expired")?;
        Ok(())
    }

    /// Cancels all pending timers and waits for the background task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.send(Event::Shutdown);
        if let Some(task) = self.task.take() {
            task.await.context("The session watcher task failed")?;
        }
        Ok(())
    }

    fn send(&self, event: Event) {
        // The task is gone once the session has expired; late events are dropped.
        if self.events.send(event).is_err() {
            trace!("Dropping {event:?}, the session watcher has stopped");
        }
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut timer: IdleTimer,
    mut events: mpsc::UnboundedReceiver<Event>,
    state: watch::Sender<SessionTimerState>,
    logout: Arc<dyn LogoutAction>,
) {
    let mut timers = Timers::default();
    let commands = timer.start();
    timers.apply(commands, logout.as_ref()).await;

    loop {
        let commands = tokio::select! {
            event = events.recv() => match event {
                Some(Event::Activity(kind)) => timer.on_activity(kind),
                Some(Event::Stay) => timer.stay_logged_in(),
                Some(Event::LogoutNow) => timer.logout_now(),
                Some(Event::Shutdown) | None => {
                    let commands = timer.shutdown();
                    timers.apply(commands, logout.as_ref()).await;
                    debug!("Session watcher shut down");
                    break;
                }
            },
            _ = fire(&mut timers.warning) => timer.on_warning_due(),
            _ = tick(&mut timers.ticks) => timer.on_tick(),
        };
        timers.apply(commands, logout.as_ref()).await;
        state.send_if_modified(|current| {
            let next = timer.state();
            let changed = *current != next;
            *current = next;
            changed
        });
        if timer.phase() == SessionPhase::Expired {
            break;
        }
    }
}

/// At most one pending warning and one countdown interval.
#[derive(Default)]
struct Timers {
    warning: Option<Pin<Box<Sleep>>>,
    ticks: Option<Interval>,
}

impl Timers {
    async fn apply(&mut self, commands: Vec<TimerCommand>, logout: &dyn LogoutAction) {
        for command in commands {
            trace!("{command:?}");
            match command {
                TimerCommand::ScheduleWarning(delay) => {
                    self.warning = Some(Box::pin(time::sleep(delay)));
                }
                TimerCommand::CancelWarning => self.warning = None,
                TimerCommand::StartTicks => {
                    self.ticks = Some(time::interval_at(Instant::now() + TICK, TICK));
                }
                TimerCommand::CancelTicks => self.ticks = None,
                TimerCommand::Logout => {
                    if let Err(e) = logout.logout().await {
                        error!("Unable to log out: {e:#}");
                    }
                }
            }
        }
    }
}

async fn fire(warning: &mut Option<Pin<Box<Sleep>>>) {
    match warning {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

async fn tick(ticks: &mut Option<Interval>) {
    match ticks {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WarningActivity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLogout(AtomicUsize);

    #[async_trait]
    impl LogoutAction for CountingLogout {
        async fn logout(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl CountingLogout {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn start(settings: TimerSettings) -> (SessionWatcher, Arc<CountingLogout>) {
        let logout = Arc::new(CountingLogout::default());
        let watcher = SessionWatcher::start(settings, logout.clone());
        (watcher, logout)
    }

    async fn advance_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_then_expiry() {
        let (watcher, logout) = start(TimerSettings::default());

        advance_ms(569_500).await;
        assert_eq!(watcher.state(), SessionTimerState::default());

        advance_ms(1_000).await;
        assert_eq!(
            watcher.state(),
            SessionTimerState {
                phase: SessionPhase::Warning,
                seconds_remaining: 30
            }
        );
        assert_eq!(logout.count(), 0);

        advance_ms(30_000).await;
        assert_eq!(watcher.state().phase, SessionPhase::Expired);
        assert_eq!(logout.count(), 1);
        watcher.expired().await.unwrap();

        advance_ms(60_000).await;
        watcher.stay_logged_in();
        watcher.record_activity(ActivityKind::KeyPress);
        advance_ms(1_000).await;
        assert_eq!(watcher.state().phase, SessionPhase::Expired);
        assert_eq!(logout.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stay_returns_to_active() {
        let (watcher, logout) = start(TimerSettings::default());
        let mut state = watcher.subscribe();

        advance_ms(585_500).await;
        assert_eq!(
            watcher.state(),
            SessionTimerState {
                phase: SessionPhase::Warning,
                seconds_remaining: 15
            }
        );

        watcher.stay_logged_in();
        state
            .wait_for(|s| s.phase == SessionPhase::Active)
            .await
            .unwrap();

        // The countdown is gone and the warning is rescheduled from now.
        advance_ms(60_000).await;
        assert_eq!(watcher.state(), SessionTimerState::default());
        assert_eq!(logout.count(), 0);

        advance_ms(511_000).await;
        assert_eq!(watcher.state().phase, SessionPhase::Warning);
        assert_eq!(logout.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_warning() {
        let (watcher, logout) = start(TimerSettings::default());

        advance_ms(500_000).await;
        watcher.record_activity(ActivityKind::PointerMove);

        advance_ms(100_000).await;
        assert_eq!(watcher.state().phase, SessionPhase::Active);

        advance_ms(470_500).await;
        assert_eq!(watcher.state().phase, SessionPhase::Warning);
        assert_eq!(logout.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_during_warning_is_ignored_by_default() {
        let (watcher, _logout) = start(TimerSettings::default());
        advance_ms(575_500).await;
        watcher.record_activity(ActivityKind::Scroll);
        advance_ms(1_000).await;
        assert_eq!(
            watcher.state(),
            SessionTimerState {
                phase: SessionPhase::Warning,
                seconds_remaining: 24
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_during_warning_resets_when_configured() {
        let settings =
            TimerSettings::default().with_warning_activity(WarningActivity::ResetOnActivity);
        let (watcher, _logout) = start(settings);
        advance_ms(575_500).await;
        watcher.record_activity(ActivityKind::TouchStart);
        advance_ms(1_000).await;
        assert_eq!(watcher.state(), SessionTimerState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_now() {
        let (watcher, logout) = start(TimerSettings::default());
        advance_ms(10_000).await;
        watcher.logout_now();
        watcher.expired().await.unwrap();
        assert_eq!(logout.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let (watcher, logout) = start(TimerSettings::default());
        let state = watcher.subscribe();
        advance_ms(580_000).await;
        watcher.shutdown().await.unwrap();
        advance_ms(120_000).await;
        assert_eq!(logout.count(), 0);
        assert_eq!(state.borrow().phase, SessionPhase::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let (watcher, logout) = start(TimerSettings::default());
        advance_ms(100_000).await;
        drop(watcher);
        advance_ms(1_000_000).await;
        assert_eq!(logout.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_warning_expires_at_limit() {
        let settings = TimerSettings::new(Duration::from_secs(60), Duration::ZERO);
        let (watcher, logout) = start(settings);
        advance_ms(59_500).await;
        assert_eq!(watcher.state().phase, SessionPhase::Active);
        advance_ms(1_000).await;
        assert_eq!(watcher.state().phase, SessionPhase::Expired);
        assert_eq!(logout.count(), 1);
    }
}
