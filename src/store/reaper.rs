//! TTL Reaper Scheduling Module
//!
//! The cache variants remove expired entries through deferred one-shot
//! actions, one armed per write. This module provides the scheduling seam:
//! a [`Scheduler`] runs a callback once after a delay, and hands back a
//! [`Deferred`] token the cache can use to cancel the action when the entry
//! it targets is overwritten, evicted, or deleted first.

use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{CacheError, Result};

// == Scheduler ==
/// A timer facility capable of executing a callback once after an elapsed
/// duration.
///
/// Registration must not block and must not run `action` inline; the action
/// executes later on the scheduler's own threads and may contend for the
/// cache lock like any foreground caller.
pub trait Scheduler: Send + Sync + 'static {
    /// Schedules `action` to run once, `delay` from now.
    fn defer(&self, delay: Duration, action: Box<dyn FnOnce() + Send + 'static>) -> Deferred;
}

// == Deferred ==
/// Cancellation token for a scheduled action.
///
/// Cancellation is best-effort: an action that already started (or already
/// ran) is unaffected. Dropping the token does NOT cancel the action; it
/// stays armed and fires on schedule.
pub struct Deferred {
    cancel: Box<dyn FnOnce() + Send + Sync + 'static>,
}

impl Deferred {
    /// Wraps the scheduler-specific cancellation routine.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancels the pending action if it has not started yet.
    pub fn cancel(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

// == Tokio Scheduler ==
/// [`Scheduler`] backed by a tokio runtime.
///
/// The runtime handle is captured at construction, so actions can be armed
/// from any thread afterwards, not only from inside the runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Captures the current tokio runtime.
    ///
    /// # Errors
    /// Returns [`CacheError::SchedulerUnavailable`] when called outside a
    /// runtime context.
    pub fn new() -> Result<Self> {
        Handle::try_current()
            .map(|handle| Self { handle })
            .map_err(|_| CacheError::SchedulerUnavailable)
    }

    /// Builds a scheduler on an explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, delay: Duration, action: Box<dyn FnOnce() + Send + 'static>) -> Deferred {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        Deferred::new(move || task.abort())
    }
}
