//! Time-boxed polling scheduler.
//!
//! A session starts with an immediate tick and then ticks every configured
//! interval until it is stopped, disabled, or (with auto-stop) its maximum
//! duration has elapsed. At most one poll is in flight at any time; a tick
//! that finds the previous poll still running is skipped, never queued.
//! Every start opens a new generation, and results belonging to an older
//! generation are dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{PollingConfig, PollingConfigPatch};
use super::connection::ConnectionStateTracker;
use super::retry_policy::{FixedInterval, RetryPolicy};
use super::task::{PollContext, PollTask, TickTrigger};
use crate::error::SyncError;

/// Default bound on a single poll.
pub const DEFAULT_IN_FLIGHT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    MaxDurationElapsed,
    RetriesExhausted,
    Disabled,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous poll has not finished yet.
    Busy,
    /// No session is running.
    NotActive,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Completed,
    /// The poll finished after its session was stopped or restarted.
    Stale,
    Failed(SyncError),
    TimedOut,
    Skipped(SkipReason),
    /// The tick found the session past its maximum duration and stopped it.
    Stopped(StopReason),
}

/// Point-in-time view of the polling session.
#[derive(Debug, Clone)]
pub struct PollingSession {
    pub status: SessionStatus,
    pub generation: u64,
    pub started_at: Option<Instant>,
    pub elapsed: Duration,
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<Instant>,
    pub last_error: Option<SyncError>,
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub in_flight_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            in_flight_timeout: DEFAULT_IN_FLIGHT_TIMEOUT,
        }
    }
}

struct SchedulerState {
    config: PollingConfig,
    status: SessionStatus,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    stop_reason: Option<StopReason>,
    ticks: u64,
    successes: u64,
    failures: u64,
    consecutive_failures: u32,
    last_success_at: Option<Instant>,
    last_error: Option<SyncError>,
    loop_token: Option<CancellationToken>,
}

impl SchedulerState {
    fn new(config: PollingConfig) -> Self {
        Self {
            config,
            status: SessionStatus::Idle,
            started_at: None,
            stopped_at: None,
            stop_reason: None,
            ticks: 0,
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
            last_success_at: None,
            last_error: None,
            loop_token: None,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        if !self.config.auto_stop {
            return None;
        }
        self.started_at
            .map(|started| started + self.config.max_duration())
    }
}

/// Clears the in-flight flag when the poll ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SchedulerInner {
    task: Arc<dyn PollTask>,
    retry_policy: Arc<dyn RetryPolicy>,
    connection: ConnectionStateTracker,
    options: SchedulerOptions,
    state: Mutex<SchedulerState>,
    generation: Arc<AtomicU64>,
    in_flight: AtomicBool,
    reschedule: Notify,
}

/// Drives a [`PollTask`] on a fixed cadence.
///
/// Cheap to clone; clones control the same session. `start` spawns the
/// polling loop, so it must be called from within a tokio runtime.
#[derive(Clone)]
pub struct PollingScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollingScheduler {
    pub fn new(
        task: Arc<dyn PollTask>,
        connection: ConnectionStateTracker,
        retry_policy: Arc<dyn RetryPolicy>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                task,
                retry_policy,
                connection,
                options,
                state: Mutex::new(SchedulerState::new(PollingConfig::default())),
                generation: Arc::new(AtomicU64::new(0)),
                in_flight: AtomicBool::new(false),
                reschedule: Notify::new(),
            }),
        }
    }

    /// Scheduler with a private connection tracker, fixed-interval retries
    /// and the default in-flight timeout.
    pub fn with_defaults(task: Arc<dyn PollTask>) -> Self {
        Self::new(
            task,
            ConnectionStateTracker::new(),
            Arc::new(FixedInterval),
            SchedulerOptions::default(),
        )
    }

    pub fn name(&self) -> &'static str {
        self.inner.task.name()
    }

    /// Start a session with `config`.
    ///
    /// If a session is already active its configuration is replaced in place
    /// and the elapsed timer keeps running. A disabled config stops an active
    /// session and never starts a new one.
    pub fn start(&self, config: PollingConfig) -> Result<(), SyncError> {
        config.validate()?;
        let inner = &self.inner;

        let mut state = inner.lock();
        if state.status == SessionStatus::Active {
            state.config = config;
            drop(state);
            if config.enabled {
                debug!("Polling {} already active, configuration updated", self.name());
                inner.reschedule.notify_one();
            } else {
                inner.halt(StopReason::Disabled, None);
            }
            return Ok(());
        }

        state.config = config;
        if !config.enabled {
            info!("Polling {} is disabled, not starting", self.name());
            return Ok(());
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        state.status = SessionStatus::Active;
        state.started_at = Some(Instant::now());
        state.stopped_at = None;
        state.stop_reason = None;
        state.ticks = 0;
        state.successes = 0;
        state.failures = 0;
        state.consecutive_failures = 0;
        state.last_success_at = None;
        state.last_error = None;
        state.loop_token = Some(token.clone());
        drop(state);

        info!(
            "Polling {} started (generation {}, every {}s, auto-stop {})",
            self.name(),
            generation,
            config.interval_secs,
            if config.auto_stop {
                format!("after {}m", config.max_duration_mins)
            } else {
                "off".to_string()
            }
        );
        tokio::spawn(Arc::clone(inner).run_loop(token, generation));
        Ok(())
    }

    /// Stop the active session. Does nothing when no session is running.
    pub fn stop(&self) {
        self.inner.halt(StopReason::Manual, None);
    }

    pub(crate) fn stop_with(&self, reason: StopReason) {
        self.inner.halt(reason, None);
    }

    /// Merge `patch` into the current configuration.
    ///
    /// Takes effect from the next scheduled tick; a poll already in flight
    /// is left alone. Disabling stops an active session.
    pub fn reconfigure(&self, patch: PollingConfigPatch) -> Result<PollingConfig, SyncError> {
        let mut state = self.inner.lock();
        let config = state.config.apply(&patch);
        config.validate()?;
        state.config = config;
        let active = state.status == SessionStatus::Active;
        drop(state);

        if active {
            if config.enabled {
                debug!("Polling {} reconfigured: {:?}", self.name(), config);
                self.inner.reschedule.notify_one();
            } else {
                self.inner.halt(StopReason::Disabled, None);
            }
        }
        Ok(config)
    }

    /// Run one tick right now, outside the regular cadence.
    ///
    /// Subject to the same single-flight and maximum-duration rules as
    /// scheduled ticks.
    pub async fn tick_now(&self) -> TickOutcome {
        Arc::clone(&self.inner).tick(TickTrigger::Manual).await
    }

    pub fn config(&self) -> PollingConfig {
        self.inner.lock().config
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn connection(&self) -> &ConnectionStateTracker {
        &self.inner.connection
    }

    pub fn session(&self) -> PollingSession {
        let state = self.inner.lock();
        let elapsed = match (state.started_at, state.status) {
            (Some(started), SessionStatus::Active) => started.elapsed(),
            (Some(started), _) => state
                .stopped_at
                .map(|stopped| stopped.duration_since(started))
                .unwrap_or_default(),
            (None, _) => Duration::ZERO,
        };
        PollingSession {
            status: state.status,
            generation: self.inner.generation.load(Ordering::SeqCst),
            started_at: state.started_at,
            elapsed,
            ticks: state.ticks,
            successes: state.successes,
            failures: state.failures,
            consecutive_failures: state.consecutive_failures,
            last_success_at: state.last_success_at,
            last_error: state.last_error.clone(),
            stop_reason: state.stop_reason,
        }
    }
}

impl SchedulerInner {
    fn name(&self) -> &'static str {
        self.task.name()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Stop the active session, optionally only if it is still `generation`.
    fn halt(&self, reason: StopReason, generation: Option<u64>) -> bool {
        let mut state = self.lock();
        if state.status != SessionStatus::Active {
            return false;
        }
        if generation.is_some_and(|generation| !self.is_current(generation)) {
            return false;
        }

        state.status = SessionStatus::Stopped;
        state.stopped_at = Some(Instant::now());
        state.stop_reason = Some(reason);
        if let Some(token) = state.loop_token.take() {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.connection.mark_stopped();
        let elapsed = state
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        drop(state);

        info!(
            "Polling {} stopped after {:?} ({:?})",
            self.name(),
            elapsed,
            reason
        );
        true
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken, generation: u64) {
        let mut last_tick = Instant::now();
        self.spawn_tick();

        loop {
            let (delay, deadline) = {
                let state = self.lock();
                if state.status != SessionStatus::Active || !self.is_current(generation) {
                    break;
                }
                (
                    self.retry_policy
                        .next_delay(state.config.interval(), state.consecutive_failures),
                    state.deadline(),
                )
            };
            let next_tick = last_tick + delay;

            tokio::select! {
                biased;

                _ = token.cancelled() => break,
                _ = sleep_until(deadline.unwrap_or(next_tick)), if deadline.is_some() => {
                    self.halt(StopReason::MaxDurationElapsed, Some(generation));
                    break;
                }
                _ = self.reschedule.notified() => {
                    debug!("Polling {} rescheduling", self.name());
                }
                _ = sleep_until(next_tick) => {
                    last_tick = Instant::now();
                    self.spawn_tick();
                }
            }
        }
        debug!("Polling {} loop for generation {} exited", self.name(), generation);
    }

    fn spawn_tick(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.tick(TickTrigger::Schedule).await;
        });
    }

    async fn tick(self: Arc<Self>, trigger: TickTrigger) -> TickOutcome {
        let generation = {
            let state = self.lock();
            if state.status != SessionStatus::Active {
                debug!("Polling {} not active, ignoring tick", self.name());
                return TickOutcome::Skipped(SkipReason::NotActive);
            }
            let generation = self.generation.load(Ordering::SeqCst);
            if state
                .deadline()
                .is_some_and(|deadline| Instant::now() >= deadline)
            {
                drop(state);
                self.halt(StopReason::MaxDurationElapsed, Some(generation));
                return TickOutcome::Stopped(StopReason::MaxDurationElapsed);
            }
            generation
        };

        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            debug!(
                "Polling {} skipping tick, previous poll still in flight",
                self.name()
            );
            return TickOutcome::Skipped(SkipReason::Busy);
        };
        self.lock().ticks += 1;

        let ctx = PollContext::new(generation, Arc::clone(&self.generation), trigger);
        let timeout = self.options.in_flight_timeout;
        match tokio::time::timeout(timeout, self.task.poll(&ctx)).await {
            Ok(Ok(())) => self.record_success(generation),
            Ok(Err(e)) => self.record_failure(generation, e),
            Err(_) => {
                let error = SyncError::network(format!(
                    "{} poll timed out after {:?}",
                    self.name(),
                    timeout
                ));
                match self.record_failure(generation, error) {
                    TickOutcome::Failed(_) => TickOutcome::TimedOut,
                    other => other,
                }
            }
        }
    }

    fn record_success(&self, generation: u64) -> TickOutcome {
        let mut state = self.lock();
        if !self.is_current(generation) {
            debug!("Polling {} dropping stale result", self.name());
            return TickOutcome::Stale;
        }
        state.successes += 1;
        state.consecutive_failures = 0;
        state.last_success_at = Some(Instant::now());
        state.last_error = None;
        if self.connection.mark_connected() {
            info!("Polling {} connected", self.name());
        }
        TickOutcome::Completed
    }

    fn record_failure(&self, generation: u64, error: SyncError) -> TickOutcome {
        let mut state = self.lock();
        if !self.is_current(generation) {
            debug!("Polling {} dropping stale failure: {}", self.name(), error);
            return TickOutcome::Stale;
        }
        state.failures += 1;
        state.consecutive_failures += 1;
        state.last_error = Some(error.clone());
        let consecutive = state.consecutive_failures;
        drop(state);

        warn!(
            "Polling {} tick failed ({} in a row): {}",
            self.name(),
            consecutive,
            error
        );
        if !self.retry_policy.should_retry(&error, consecutive) {
            warn!("Polling {} giving up after {} failures", self.name(), consecutive);
            self.halt(StopReason::RetriesExhausted, Some(generation));
        }
        TickOutcome::Failed(error)
    }
}
