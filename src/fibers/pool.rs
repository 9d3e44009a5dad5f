//! # Pooled-batch fiber.
//!
//! No dedicated thread: enqueued actions accumulate in a pending list and a
//! flush task on the shared tokio pool drains them in batches. Hundreds of
//! mostly-idle fibers cost nothing but their buffers.
//!
//! ## Flush protocol
//! ```text
//! enqueue:            flush task:
//!   spinlock {          spinlock { swap(pending, scratch) }
//!     push(action)      executor.execute_batch(scratch)      (outside the lock)
//!     first? ──────►    spinlock { more pending? }
//!   }                     ├─ yes ─► spawn a NEW flush task (chained, fair)
//!                         └─ no  ─► clear flush_scheduled
//! ```
//! - The pending list and its scratch twin trade places under the
//!   [`SpinLock`](crate::sync::SpinLock) (push/swap only — microseconds), so
//!   enqueues during execution land in a fresh list without blocking.
//! - A drained batch never re-runs on the same task: if new actions arrived
//!   mid-batch, a fresh task is spawned. One busy fiber therefore cannot pin
//!   a pool thread indefinitely, yet stays chained until drained.
//!
//! ## Disposal
//! `dispose` cancels the token; the next flush observes it, drops whatever
//! is pending and stops the chain. The batch already executing finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::FiberConfig;
use crate::error::ConfigError;
use crate::executor::{Executor, ExecutorRef};
use crate::fibers::{Action, Fiber, FiberRef, RepeatAction};
use crate::scheduler::{EnqueueSink, Scheduler, TimerHandle};
use crate::sync::SpinLock;

struct PendingState {
    pending: Vec<Action>,
    flush_scheduled: bool,
    started: bool,
}

struct PoolShared {
    state: SpinLock<PendingState>,
    executor: ExecutorRef,
    handle: Handle,
    token: CancellationToken,
}

impl PoolShared {
    fn enqueue(shared: &Arc<Self>, action: Action) {
        if shared.token.is_cancelled() {
            return;
        }
        let start_flush = {
            let mut state = shared.state.lock();
            state.pending.push(action);
            if state.started && !state.flush_scheduled {
                state.flush_scheduled = true;
                true
            } else {
                false
            }
        };
        if start_flush {
            Self::spawn_flush(shared, Vec::new());
        }
    }

    fn spawn_flush(shared: &Arc<Self>, scratch: Vec<Action>) {
        let shared = Arc::clone(shared);
        let handle = shared.handle.clone();
        handle.spawn(async move { Self::flush(&shared, scratch) });
    }

    fn flush(shared: &Arc<Self>, mut scratch: Vec<Action>) {
        if shared.token.is_cancelled() {
            let mut state = shared.state.lock();
            state.pending.clear();
            state.flush_scheduled = false;
            return;
        }
        {
            let mut state = shared.state.lock();
            if state.pending.is_empty() {
                state.flush_scheduled = false;
                return;
            }
            std::mem::swap(&mut state.pending, &mut scratch);
        }
        shared.executor.execute_batch(&mut scratch);
        let more = {
            let mut state = shared.state.lock();
            if state.pending.is_empty() {
                state.flush_scheduled = false;
                false
            } else {
                true
            }
        };
        if more {
            Self::spawn_flush(shared, scratch);
        }
    }
}

/// Fiber whose batches run on the shared tokio worker pool.
pub struct PoolFiber {
    shared: Arc<PoolShared>,
    scheduler: Scheduler,
}

impl PoolFiber {
    /// Creates **and starts** a fiber with the default executor.
    pub fn start_new() -> Result<FiberRef, ConfigError> {
        Self::start_with(Executor::default().into_ref())
    }

    /// Creates **and starts** a fiber running batches through `executor`.
    pub fn start_with(executor: ExecutorRef) -> Result<FiberRef, ConfigError> {
        let fiber = Self::create(&FiberConfig::pool(), executor)?;
        fiber.start()?;
        Ok(fiber)
    }

    /// Creates a fiber in the `Created` state; enqueues buffer until
    /// [`Fiber::start`] releases the first flush.
    pub(crate) fn create(
        config: &FiberConfig,
        executor: ExecutorRef,
    ) -> Result<Arc<Self>, ConfigError> {
        let scheduler = Scheduler::current()?;
        let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Ok(Arc::new(Self {
            shared: Arc::new(PoolShared {
                state: SpinLock::new(PendingState {
                    pending: Vec::with_capacity(config.initial_capacity),
                    flush_scheduled: false,
                    started: false,
                }),
                executor,
                handle,
                token: CancellationToken::new(),
            }),
            scheduler,
        }))
    }

    fn sink(&self) -> EnqueueSink {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |action| PoolShared::enqueue(&shared, action))
    }
}

impl Fiber for PoolFiber {
    fn enqueue(&self, action: Action) {
        PoolShared::enqueue(&self.shared, action);
    }

    fn start(&self) -> Result<(), ConfigError> {
        let release_flush = {
            let mut state = self.shared.state.lock();
            state.started = true;
            if !state.pending.is_empty() && !state.flush_scheduled {
                state.flush_scheduled = true;
                true
            } else {
                false
            }
        };
        if release_flush {
            PoolShared::spawn_flush(&self.shared, Vec::new());
        }
        Ok(())
    }

    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle {
        self.scheduler
            .schedule_sink(self.sink(), &self.shared.token, delay, action)
    }

    fn schedule_repeating(
        &self,
        initial: Duration,
        interval: Duration,
        action: RepeatAction,
    ) -> TimerHandle {
        self.scheduler.schedule_repeating_sink(
            self.sink(),
            &self.shared.token,
            initial,
            interval,
            action,
        )
    }

    fn dispose(&self) {
        self.shared.token.cancel();
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.shared.token
    }
}
