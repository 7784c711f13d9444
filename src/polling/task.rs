use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::SyncError;

/// What caused a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTrigger {
    Schedule,
    Manual,
}

/// Context handed to a [`PollTask`] for one tick.
///
/// A tick belongs to the polling generation that was current when it was
/// dispatched. Once the session is stopped or restarted, `is_current()`
/// turns false and the task must not apply what it fetched.
#[derive(Debug, Clone)]
pub struct PollContext {
    generation: u64,
    current: Arc<AtomicU64>,
    trigger: TickTrigger,
}

impl PollContext {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>, trigger: TickTrigger) -> Self {
        Self {
            generation,
            current,
            trigger,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn trigger(&self) -> TickTrigger {
        self.trigger
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Work performed on every polling tick.
#[async_trait]
pub trait PollTask: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn poll(&self, ctx: &PollContext) -> Result<(), SyncError>;
}
