//! # The fiber contract.
//!
//! Everything above this layer (channels, timers, agents, collections)
//! communicates exclusively by enqueueing closures onto a fiber. The trait
//! is deliberately small: a queue, a lifecycle, and two timer helpers.
//!
//! ## Guarantees every implementation upholds
//! - **Serialization**: at most one action of a given fiber executes at any
//!   instant, system-wide.
//! - **Order**: actions execute in the order their `enqueue` calls returned.
//! - **Containment**: a panicking action is isolated by the executor; it
//!   never unwinds into the queue machinery or across threads.
//! - **Lifecycle**: `Created → Running → Disposed`, one-way. Actions
//!   enqueued before `start` are buffered; actions enqueued after `dispose`
//!   are dropped silently.
//!
//! All methods are safe to call from any thread.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::scheduler::TimerHandle;

/// A deferred, zero-argument unit of work.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// A re-runnable unit of work for recurring timers.
pub type RepeatAction = Arc<dyn Fn() + Send + Sync + 'static>;

/// Shared handle to a fiber.
pub type FiberRef = Arc<dyn Fiber>;

/// A logical single-threaded execution context.
pub trait Fiber: Send + Sync + 'static {
    /// Appends an action to the fiber's queue.
    ///
    /// Non-blocking: returns once the action is queued, not once it ran.
    /// After [`dispose`](Self::dispose) this is a silent no-op.
    fn enqueue(&self, action: Action);

    /// Transitions `Created → Running` and begins consuming the queue.
    ///
    /// Idempotent; the factories call this for you. Actions enqueued before
    /// the first `start` run once it happens, in order.
    fn start(&self) -> Result<(), crate::error::ConfigError>;

    /// Enqueues `action` once after `delay` (via the shared timer pool).
    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle;

    /// Enqueues `action` after `initial`, then every `interval`, until the
    /// returned handle or this fiber is disposed.
    fn schedule_repeating(
        &self,
        initial: Duration,
        interval: Duration,
        action: RepeatAction,
    ) -> TimerHandle;

    /// Transitions to `Disposed`: stops consuming new batches, cancels
    /// timers aimed here, releases any dedicated thread. Idempotent; a
    /// batch already being executed may finish.
    fn dispose(&self);

    /// Root token of this fiber's lifetime. Subscriptions and timers
    /// register children of it, which is how fiber disposal detaches
    /// everything that targeted the fiber.
    fn cancellation(&self) -> &CancellationToken;

    /// True once [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool {
        self.cancellation().is_cancelled()
    }
}

impl std::fmt::Debug for dyn Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
