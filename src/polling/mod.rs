//! Interval polling with auto-stop, single-flight ticks and connection status.

mod config;
mod connection;
mod retry_policy;
mod scheduler;
mod task;

pub use config::{PollingConfig, PollingConfigPatch, MIN_INTERVAL_SECS};
pub use connection::{ConnectionStateTracker, ConnectionStatus};
pub use retry_policy::{ExponentialBackoff, FixedInterval, RetryPolicy};
pub use scheduler::{
    PollingScheduler, PollingSession, SchedulerOptions, SessionStatus, SkipReason, StopReason,
    TickOutcome, DEFAULT_IN_FLIGHT_TIMEOUT,
};
pub use task::{PollContext, PollTask, TickTrigger};
