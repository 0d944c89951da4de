use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::{debug, warn};

/// Period of the session tick while a test is running
pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Focus(bool),
    Tick,
}

/// Source of terminal and timer events
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source using crossterm.
///
/// The same channel carries ticks; hand [`CrosstermEventSource::tick_scheduler`]
/// to the session so scheduled ticks arrive in order with key events.
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let reader_tx = tx.clone();

        thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => Some(AppEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => Some(AppEvent::Resize),
                Ok(CtEvent::FocusGained) => Some(AppEvent::Focus(true)),
                Ok(CtEvent::FocusLost) => Some(AppEvent::Focus(false)),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "terminal event reader stopped");
                    break;
                }
            };

            if let Some(evt) = evt {
                if reader_tx.send(evt).is_err() {
                    break;
                }
            }
        });

        Self { tx, rx }
    }

    pub fn tick_scheduler(&self) -> ChannelTickScheduler {
        ChannelTickScheduler::new(self.tx.clone())
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit and headless tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Outcome of a single [`Runner::step`]
#[derive(Clone, Debug)]
pub enum Step {
    Event(AppEvent),
    Timeout,
    Closed,
}

/// Runner that advances the application one event at a time
pub struct Runner<E: EventSource> {
    event_source: E,
    poll_interval: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, poll_interval: Duration) -> Self {
        Self {
            event_source,
            poll_interval,
        }
    }

    /// Blocks up to the poll interval for the next event
    pub fn step(&self) -> Step {
        match self.event_source.recv_timeout(self.poll_interval) {
            Ok(ev) => Step::Event(ev),
            Err(RecvTimeoutError::Timeout) => Step::Timeout,
            Err(RecvTimeoutError::Disconnected) => Step::Closed,
        }
    }
}

/// Handle to a scheduled recurring tick. Dropping it cancels the tick.
#[derive(Debug)]
pub struct TickGuard {
    cancelled: Arc<AtomicBool>,
}

impl TickGuard {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag observed by whoever produces the ticks
    pub fn token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Default for TickGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts a recurring tick and hands back the guard that stops it
pub trait TickScheduler {
    fn schedule(&self, period: Duration) -> TickGuard;
}

/// Sends [`AppEvent::Tick`] into an event channel from a background thread
#[derive(Clone, Debug)]
pub struct ChannelTickScheduler {
    tx: Sender<AppEvent>,
}

impl ChannelTickScheduler {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx }
    }
}

impl TickScheduler for ChannelTickScheduler {
    fn schedule(&self, period: Duration) -> TickGuard {
        let guard = TickGuard::new();
        let cancelled = guard.token();
        let tx = self.tx.clone();

        thread::spawn(move || loop {
            thread::sleep(period);
            if cancelled.load(Ordering::SeqCst) || tx.send(AppEvent::Tick).is_err() {
                debug!("tick thread exiting");
                break;
            }
        });

        guard
    }
}

/// Records schedules without producing ticks; the caller drives ticks by hand
#[derive(Clone, Debug, Default)]
pub struct ManualTickScheduler {
    scheduled: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl ManualTickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many ticks were ever scheduled
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// How many scheduled ticks have not been cancelled
    pub fn active_count(&self) -> usize {
        self.scheduled
            .lock()
            .map(|s| s.iter().filter(|c| !c.load(Ordering::SeqCst)).count())
            .unwrap_or_default()
    }
}

impl TickScheduler for ManualTickScheduler {
    fn schedule(&self, _period: Duration) -> TickGuard {
        let guard = TickGuard::new();
        if let Ok(mut scheduled) = self.scheduled.lock() {
            scheduled.push(guard.token());
        }
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn step_returns_timeout_when_idle() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(1));

        assert!(matches!(runner.step(), Step::Timeout));
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(10));

        assert!(matches!(runner.step(), Step::Event(AppEvent::Resize)));
    }

    #[test]
    fn step_reports_closed_channel() {
        let (tx, rx) = mpsc::channel::<AppEvent>();
        drop(tx);
        let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(10));

        assert!(matches!(runner.step(), Step::Closed));
    }

    #[test]
    fn tick_guard_cancels_on_drop() {
        let guard = TickGuard::new();
        let token = guard.token();
        assert!(!token.load(Ordering::SeqCst));

        drop(guard);
        assert!(token.load(Ordering::SeqCst));
    }

    #[test]
    fn channel_scheduler_ticks_until_cancelled() {
        let (tx, rx) = mpsc::channel();
        let scheduler = ChannelTickScheduler::new(tx);

        let guard = scheduler.schedule(Duration::from_millis(5));
        let first = rx.recv_timeout(Duration::from_secs(1));
        assert!(matches!(first, Ok(AppEvent::Tick)));

        drop(guard);
        thread::sleep(Duration::from_millis(50));
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(50));

        // the scheduler still holds a sender, so the channel stays open but quiet
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn manual_scheduler_tracks_guards() {
        let scheduler = ManualTickScheduler::new();
        let a = scheduler.schedule(Duration::from_millis(TICK_RATE_MS));
        let b = scheduler.schedule(Duration::from_millis(TICK_RATE_MS));
        assert_eq!(scheduler.scheduled_count(), 2);
        assert_eq!(scheduler.active_count(), 2);

        a.cancel();
        assert_eq!(scheduler.active_count(), 1);
        drop(b);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.scheduled_count(), 2);
    }
}
