//! # Timer-driven delivery onto fibers.
//!
//! [`Scheduler`] plants one-shot and recurring timers that, on firing,
//! enqueue an action onto a target fiber. Timers run as tasks on the shared
//! tokio pool; the *enqueue* is the only thing a timer does, so scheduled
//! work still executes under the target fiber's serialization guarantee.
//!
//! ## Cancellation model
//! ```text
//! fiber token ──child──► timer token ──guards──► timer task
//! ```
//! - [`TimerHandle::dispose`] cancels **future** firings. A fire that has
//!   already enqueued its action is not retracted; the action runs.
//! - Timer tokens are children of the fiber's token, so disposing a fiber
//!   cancels every timer still aimed at it.
//!
//! ## Liveness
//! A scheduled action that panics is contained by the executor like any
//! other action; a recurring timer keeps firing afterwards. The timer task
//! itself runs no user code outside the enqueue.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::fibers::{Action, FiberRef, RepeatAction};

/// Cross-thread enqueue entry point of one fiber, detached from the trait
/// object so timer tasks hold only what they need.
pub(crate) type EnqueueSink = std::sync::Arc<dyn Fn(Action) + Send + Sync>;

/// Plants timers on the shared tokio pool.
///
/// Cheap to clone; every fiber owns one and uses it to implement its
/// `schedule`/`schedule_repeating` methods.
#[derive(Clone, Debug)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// Captures the ambient runtime.
    ///
    /// Returns [`ConfigError::NoRuntime`] when called outside a tokio
    /// runtime (timers have nowhere to run).
    pub fn current() -> Result<Self, ConfigError> {
        Handle::try_current()
            .map(|handle| Self { handle })
            .map_err(|_| ConfigError::NoRuntime)
    }

    /// Enqueues `action` onto `fiber` once, after `delay`.
    pub fn schedule(&self, fiber: &FiberRef, delay: Duration, action: Action) -> TimerHandle {
        let sink = sink_of(fiber);
        self.schedule_sink(sink, fiber.cancellation(), delay, action)
    }

    /// Enqueues `action` onto `fiber` after `initial`, then every `interval`
    /// until the handle (or the fiber) is disposed.
    pub fn schedule_repeating(
        &self,
        fiber: &FiberRef,
        initial: Duration,
        interval: Duration,
        action: RepeatAction,
    ) -> TimerHandle {
        let sink = sink_of(fiber);
        self.schedule_repeating_sink(sink, fiber.cancellation(), initial, interval, action)
    }

    pub(crate) fn schedule_sink(
        &self,
        sink: EnqueueSink,
        parent: &CancellationToken,
        delay: Duration,
        action: Action,
    ) -> TimerHandle {
        let token = parent.child_token();
        let guard = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => sink(action),
            }
        });
        TimerHandle { token }
    }

    pub(crate) fn schedule_repeating_sink(
        &self,
        sink: EnqueueSink,
        parent: &CancellationToken,
        initial: Duration,
        interval: Duration,
        action: RepeatAction,
    ) -> TimerHandle {
        let token = parent.child_token();
        let guard = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => return,
                _ = tokio::time::sleep(initial) => {}
            }
            loop {
                let tick = RepeatAction::clone(&action);
                sink(Box::new(move || tick()));
                tokio::select! {
                    _ = guard.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
        TimerHandle { token }
    }
}

fn sink_of(fiber: &FiberRef) -> EnqueueSink {
    let fiber = FiberRef::clone(fiber);
    std::sync::Arc::new(move |action| fiber.enqueue(action))
}

/// Cancellation handle for one planted timer.
///
/// Disposal prevents future firings only; it does not retract an action the
/// timer already enqueued. Dropping the handle does **not** cancel the
/// timer — call [`TimerHandle::dispose`], or dispose the target fiber.
#[derive(Clone, Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Stops future firings. Idempotent.
    pub fn dispose(&self) {
        self.token.cancel();
    }

    /// True once [`dispose`](Self::dispose) was called (directly or via the
    /// target fiber's disposal).
    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fibers::ThreadFiber;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().expect("runtime")
    }

    #[test]
    fn test_one_shot_fires_after_delay() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = ThreadFiber::start_new().expect("fiber");
        let (tx, rx) = std::sync::mpsc::channel();

        let started = Instant::now();
        let _timer = fiber.schedule(
            Duration::from_millis(80),
            Box::new(move || {
                let _ = tx.send(started.elapsed());
            }),
        );

        let elapsed = rx.recv_timeout(Duration::from_secs(5)).expect("fired");
        assert!(elapsed >= Duration::from_millis(70), "fired early: {elapsed:?}");
        fiber.dispose();
    }

    #[test]
    fn test_disposed_timer_does_not_fire() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = ThreadFiber::start_new().expect("fiber");
        let fired = Arc::new(AtomicUsize::new(0));

        let timer = {
            let fired = Arc::clone(&fired);
            fiber.schedule(
                Duration::from_millis(100),
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };
        timer.dispose();
        assert!(timer.is_disposed());

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        fiber.dispose();
    }

    #[test]
    fn test_repeating_fires_until_disposed() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = ThreadFiber::start_new().expect("fiber");
        let fired = Arc::new(AtomicUsize::new(0));

        let timer = {
            let fired = Arc::clone(&fired);
            fiber.schedule_repeating(
                Duration::from_millis(20),
                Duration::from_millis(20),
                Arc::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };

        std::thread::sleep(Duration::from_millis(300));
        timer.dispose();
        let seen = fired.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected several firings, saw {seen}");

        std::thread::sleep(Duration::from_millis(150));
        let after = fired.load(Ordering::SeqCst);
        // one in-flight fire may still land after dispose
        assert!(after <= seen + 1, "timer kept firing after dispose");
        fiber.dispose();
    }

    #[test]
    fn test_fiber_dispose_cancels_timers() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = ThreadFiber::start_new().expect("fiber");
        let fired = Arc::new(AtomicUsize::new(0));

        let timer = {
            let fired = Arc::clone(&fired);
            fiber.schedule(
                Duration::from_millis(120),
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };
        fiber.dispose();
        assert!(timer.is_disposed());

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_standalone_scheduler_targets_a_fiber() {
        let rt = runtime();
        let _guard = rt.enter();
        let scheduler = Scheduler::current().expect("scheduler");
        let fiber = ThreadFiber::start_new().expect("fiber");

        let (tx, rx) = std::sync::mpsc::channel();
        let _timer = scheduler.schedule(
            &fiber,
            Duration::from_millis(30),
            Box::new(move || {
                let _ = tx.send("fired");
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("fired"));

        let fired = Arc::new(AtomicUsize::new(0));
        let repeating = {
            let fired = Arc::clone(&fired);
            scheduler.schedule_repeating(
                &fiber,
                Duration::from_millis(10),
                Duration::from_millis(25),
                Arc::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };
        std::thread::sleep(Duration::from_millis(200));
        repeating.dispose();
        assert!(fired.load(Ordering::SeqCst) >= 2);
        fiber.dispose();
    }

    #[test]
    fn test_scheduler_requires_runtime() {
        assert!(Scheduler::current().is_err());
    }
}
