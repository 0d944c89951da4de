use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::language::Difficulty;
use crate::metrics::{self, Metrics};
use crate::runtime::{TickGuard, TickScheduler, TICK_RATE_MS};
use crate::word_generator::{WordGenConfig, WordGenerator};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeLimitError {
    #[error("time limit must be one of 15, 30, 60 or 90 seconds, got {0}")]
    Unsupported(u64),
    #[error("time limit is not a number: {0:?}")]
    NotANumber(String),
}

/// Session length in seconds, restricted to [`TimeLimit::ALLOWED`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TimeLimit(u64);

impl TimeLimit {
    pub const ALLOWED: [u64; 4] = [15, 30, 60, 90];

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64
    }

    /// Next allowed limit, wrapping from 90 back to 15
    pub fn next(self) -> Self {
        let idx = Self::ALLOWED.iter().position(|&s| s == self.0).unwrap_or(0);
        TimeLimit(Self::ALLOWED[(idx + 1) % Self::ALLOWED.len()])
    }
}

impl Default for TimeLimit {
    fn default() -> Self {
        TimeLimit(60)
    }
}

impl TryFrom<u64> for TimeLimit {
    type Error = TimeLimitError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&secs) {
            Ok(TimeLimit(secs))
        } else {
            Err(TimeLimitError::Unsupported(secs))
        }
    }
}

impl From<TimeLimit> for u64 {
    fn from(limit: TimeLimit) -> Self {
        limit.0
    }
}

impl FromStr for TimeLimit {
    type Err = TimeLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s
            .trim()
            .parse::<u64>()
            .map_err(|_| TimeLimitError::NotANumber(s.to_string()))?;
        TimeLimit::try_from(secs)
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings that shape a session; only mutable while idle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub difficulty: Difficulty,
    pub include_numbers: bool,
    pub include_symbols: bool,
    pub time_limit: TimeLimit,
}

impl SessionConfig {
    fn word_gen_config(&self) -> WordGenConfig {
        WordGenConfig {
            difficulty: self.difficulty,
            include_numbers: self.include_numbers,
            include_symbols: self.include_symbols,
        }
    }
}

/// A single configuration update coming from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    TimeLimit(TimeLimit),
    Difficulty(Difficulty),
    IncludeNumbers(bool),
    IncludeSymbols(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    TimeUp,
    TextCompleted,
}

/// Read-only view of a session for rendering and reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub config: SessionConfig,
    pub target_text: String,
    pub user_input: String,
    pub time_limit_seconds: u64,
    pub remaining_seconds: f64,
    pub elapsed_seconds: f64,
    pub wpm: u32,
    pub raw_wpm: u32,
    pub accuracy_percent: u32,
}

/// The typing session state machine: idle → running → finished → (reset) idle.
///
/// All invalid transitions are silent no-ops. The recurring tick is held as a
/// [`TickGuard`] only while running, so every way out of `Running` cancels it.
pub struct Session {
    config: SessionConfig,
    phase: Phase,
    target: String,
    target_len: usize,
    input: String,
    started_at: Option<Instant>,
    elapsed_secs: f64,
    remaining_secs: f64,
    metrics: Metrics,
    tick: Option<TickGuard>,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore>,
    scheduler: Box<dyn TickScheduler>,
}

impl Session {
    pub fn new(config: SessionConfig, scheduler: impl TickScheduler + 'static) -> Self {
        Self::with_parts(config, scheduler, SystemClock, StdRng::from_entropy())
    }

    pub fn with_parts(
        config: SessionConfig,
        scheduler: impl TickScheduler + 'static,
        clock: impl Clock + 'static,
        rng: impl RngCore + 'static,
    ) -> Self {
        let mut session = Self {
            config,
            phase: Phase::Idle,
            target: String::new(),
            target_len: 0,
            input: String::new(),
            started_at: None,
            elapsed_secs: 0.0,
            remaining_secs: config.time_limit.as_secs_f64(),
            metrics: Metrics::default(),
            tick: None,
            clock: Box::new(clock),
            rng: Box::new(rng),
            scheduler: Box::new(scheduler),
        };
        session.regenerate();
        session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn target_text(&self) -> &str {
        &self.target
    }

    pub fn user_input(&self) -> &str {
        &self.input
    }

    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn remaining_secs(&self) -> f64 {
        self.remaining_secs
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn has_started(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn has_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Whether a recurring tick is currently held
    pub fn is_ticking(&self) -> bool {
        self.tick.is_some()
    }

    /// Apply a configuration change. Only honored while idle; returns whether
    /// anything changed.
    pub fn change_config(&mut self, change: ConfigChange) -> bool {
        if self.phase != Phase::Idle {
            debug!(?change, phase = ?self.phase, "config change ignored");
            return false;
        }

        let mut next = self.config;
        match change {
            ConfigChange::TimeLimit(limit) => next.time_limit = limit,
            ConfigChange::Difficulty(difficulty) => next.difficulty = difficulty,
            ConfigChange::IncludeNumbers(on) => next.include_numbers = on,
            ConfigChange::IncludeSymbols(on) => next.include_symbols = on,
        }

        if next == self.config {
            return false;
        }

        debug!(?change, "config changed");
        self.config = next;
        self.remaining_secs = self.config.time_limit.as_secs_f64();
        self.regenerate();
        true
    }

    /// Replace the generated text while idle
    pub fn set_target_text(&mut self, text: impl Into<String>) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.target = text.into();
        self.target_len = self.target.chars().count();
        self.input.clear();
        true
    }

    /// Mirror the presentation layer's input buffer.
    ///
    /// The first non-empty value starts the session. Values longer than the
    /// target are rejected whole and the previous input is kept. Input after
    /// the session finished is ignored.
    pub fn on_input(&mut self, value: &str) {
        if self.phase == Phase::Finished {
            debug!("input ignored after finish");
            return;
        }

        if value.chars().count() > self.target_len {
            debug!(len = value.chars().count(), max = self.target_len, "input rejected");
            return;
        }

        if self.phase == Phase::Idle {
            if value.is_empty() {
                return;
            }
            self.start();
        }

        self.input.clear();
        self.input.push_str(value);
        self.refresh();

        if self.input_len() >= self.target_len {
            self.finish(FinishReason::TextCompleted);
        }
    }

    /// Append one char to the current input
    pub fn type_char(&mut self, c: char) {
        let mut next = self.input.clone();
        next.push(c);
        self.on_input(&next);
    }

    /// Drop the last char of the current input
    pub fn backspace(&mut self) {
        if self.input.is_empty() {
            return;
        }
        let mut next = self.input.clone();
        next.pop();
        self.on_input(&next);
    }

    /// Periodic update while running; finishes the session once time is up
    pub fn on_tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }

        self.refresh();

        if self.elapsed_secs >= self.config.time_limit.as_secs_f64() {
            self.finish(FinishReason::TimeUp);
        }
    }

    /// Back to idle with fresh text; configuration is kept
    pub fn reset(&mut self) {
        // releases the tick before anything else
        self.tick = None;

        self.phase = Phase::Idle;
        self.input.clear();
        self.started_at = None;
        self.elapsed_secs = 0.0;
        self.remaining_secs = self.config.time_limit.as_secs_f64();
        self.metrics = Metrics::default();
        self.regenerate();

        info!(config = ?self.config, "session reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            config: self.config,
            target_text: self.target.clone(),
            user_input: self.input.clone(),
            time_limit_seconds: self.config.time_limit.secs(),
            remaining_seconds: self.remaining_secs,
            elapsed_seconds: self.elapsed_secs,
            wpm: self.metrics.wpm,
            raw_wpm: self.metrics.raw_wpm,
            accuracy_percent: self.metrics.accuracy,
        }
    }

    fn start(&mut self) {
        self.started_at = Some(self.clock.now());
        self.remaining_secs = self.config.time_limit.as_secs_f64();
        self.phase = Phase::Running;
        self.tick = Some(self.scheduler.schedule(Duration::from_millis(TICK_RATE_MS)));

        info!(
            difficulty = %self.config.difficulty,
            time_limit = self.config.time_limit.secs(),
            "session started"
        );
    }

    fn finish(&mut self, reason: FinishReason) {
        self.tick = None;
        self.phase = Phase::Finished;

        info!(
            ?reason,
            wpm = self.metrics.wpm,
            raw_wpm = self.metrics.raw_wpm,
            accuracy = self.metrics.accuracy,
            elapsed = self.elapsed_secs,
            "session finished"
        );
    }

    fn refresh(&mut self) {
        let Some(started_at) = self.started_at else {
            return;
        };

        let now = self.clock.now();
        self.elapsed_secs = now.saturating_duration_since(started_at).as_secs_f64();
        self.remaining_secs = (self.config.time_limit.as_secs_f64() - self.elapsed_secs).max(0.0);
        self.metrics = metrics::calculate(self.metrics, self.elapsed_secs, &self.input, &self.target);
    }

    fn regenerate(&mut self) {
        let generator = WordGenerator::new(self.config.word_gen_config());
        self.target = generator.generate_prompt(self.rng.as_mut());
        self.target_len = self.target.chars().count();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("target_len", &self.target_len)
            .field("input", &self.input)
            .field("started_at", &self.started_at)
            .field("elapsed_secs", &self.elapsed_secs)
            .field("remaining_secs", &self.remaining_secs)
            .field("metrics", &self.metrics)
            .field("ticking", &self.tick.is_some())
            .finish_non_exhaustive()
    }
}
