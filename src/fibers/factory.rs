//! # Fiber factory.
//!
//! One entry point that turns a [`FiberConfig`] into a started fiber of the
//! requested strategy. Strategy selection errors (unknown tag, missing
//! runtime) surface here as [`ConfigError`], at construction time.

use crate::config::{FiberConfig, FiberKind};
use crate::error::ConfigError;
use crate::executor::{Executor, ExecutorRef};
use crate::fibers::{FiberRef, PoolFiber, StubFiber, ThreadFiber};

/// Builds **and starts** a fiber of the configured kind with the default
/// executor.
///
/// # Example
/// ```
/// use fibra::{spawn_fiber, Fiber, FiberConfig, FiberKind};
///
/// #[tokio::main]
/// async fn main() {
///     let kind: FiberKind = "thread".parse().expect("known tag");
///     let fiber = spawn_fiber(&FiberConfig::of(kind)).expect("runtime running");
///     fiber.enqueue(Box::new(|| println!("hello from the fiber")));
///     fiber.dispose();
/// }
/// ```
pub fn spawn_fiber(config: &FiberConfig) -> Result<FiberRef, ConfigError> {
    spawn_fiber_with(config, Executor::default().into_ref())
}

/// Builds **and starts** a fiber of the configured kind, running batches
/// through the given executor.
pub fn spawn_fiber_with(
    config: &FiberConfig,
    executor: ExecutorRef,
) -> Result<FiberRef, ConfigError> {
    let fiber: FiberRef = match config.kind {
        FiberKind::Thread => ThreadFiber::create(config, executor)?,
        FiberKind::Pool => PoolFiber::create(config, executor)?,
        FiberKind::Stub => StubFiber::create(executor)?,
    };
    fiber.start()?;
    Ok(fiber)
}
