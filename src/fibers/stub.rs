//! # Inline/stub fiber.
//!
//! Executes every action immediately on the calling thread through the
//! executor — no queue, no hand-off, no parallelism. Intended for
//! deterministic single-threaded tests and known-single-producer wiring.
//!
//! **Not safe for concurrent enqueuers**: there is deliberately no lock
//! forcing sequentiality (one would deadlock re-entrant publishes), so two
//! threads enqueueing at once *will* run actions concurrently, violating
//! the fiber guarantee. Use a thread or pool fiber for that.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::executor::{Executor, ExecutorRef};
use crate::fibers::{Action, Fiber, FiberRef, RepeatAction};
use crate::scheduler::{EnqueueSink, Scheduler, TimerHandle};

/// Fiber that runs actions inline on the caller's thread.
pub struct StubFiber {
    executor: ExecutorRef,
    scheduler: Scheduler,
    token: CancellationToken,
    started: Mutex<StartState>,
}

enum StartState {
    Buffering(Vec<Action>),
    Running,
}

impl StubFiber {
    /// Creates **and starts** a stub fiber with the default executor.
    pub fn start_new() -> Result<FiberRef, ConfigError> {
        Self::start_with(Executor::default().into_ref())
    }

    /// Creates **and starts** a stub fiber with a custom executor.
    pub fn start_with(executor: ExecutorRef) -> Result<FiberRef, ConfigError> {
        let fiber = Self::create(executor)?;
        fiber.start()?;
        Ok(fiber)
    }

    /// Creates a stub fiber in the `Created` state; enqueues buffer until
    /// [`Fiber::start`] replays them inline, in order.
    pub(crate) fn create(executor: ExecutorRef) -> Result<Arc<Self>, ConfigError> {
        Ok(Arc::new(Self {
            executor,
            scheduler: Scheduler::current()?,
            token: CancellationToken::new(),
            started: Mutex::new(StartState::Buffering(Vec::new())),
        }))
    }

    fn sink(&self) -> EnqueueSink {
        let executor = ExecutorRef::clone(&self.executor);
        let token = self.token.clone();
        Arc::new(move |action| {
            if !token.is_cancelled() {
                executor.execute(action);
            }
        })
    }
}

impl Fiber for StubFiber {
    fn enqueue(&self, action: Action) {
        if self.token.is_cancelled() {
            return;
        }
        {
            let mut state = self.started.lock();
            if let StartState::Buffering(pending) = &mut *state {
                pending.push(action);
                return;
            }
        }
        self.executor.execute(action);
    }

    fn start(&self) -> Result<(), ConfigError> {
        let mut buffered = {
            let mut state = self.started.lock();
            match std::mem::replace(&mut *state, StartState::Running) {
                StartState::Buffering(pending) => pending,
                StartState::Running => return Ok(()),
            }
        };
        self.executor.execute_batch(&mut buffered);
        Ok(())
    }

    fn schedule(&self, delay: Duration, action: Action) -> TimerHandle {
        // the timer fires on a pool thread; with a stub fiber that is also
        // where the action runs
        self.scheduler
            .schedule_sink(self.sink(), &self.token, delay, action)
    }

    fn schedule_repeating(
        &self,
        initial: Duration,
        interval: Duration,
        action: RepeatAction,
    ) -> TimerHandle {
        self.scheduler
            .schedule_repeating_sink(self.sink(), &self.token, initial, interval, action)
    }

    fn dispose(&self) {
        self.token.cancel();
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.token
    }
}
