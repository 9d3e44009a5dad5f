//! # Fibers: serialized execution contexts.
//!
//! A fiber owns a FIFO action queue and guarantees that everything enqueued
//! to it runs one-at-a-time, in enqueue order, regardless of which physical
//! thread does the running. Three strategies implement one contract:
//!
//! - [`ThreadFiber`] — one private worker thread per fiber;
//! - [`PoolFiber`] — batches flushed onto the shared tokio pool;
//! - [`StubFiber`] — inline execution on the calling thread (tests,
//!   known-single-producer wiring).

mod factory;
mod fiber;
mod pool;
mod stub;
mod thread;

pub use factory::{spawn_fiber, spawn_fiber_with};
pub use fiber::{Action, Fiber, FiberRef, RepeatAction};
pub use pool::PoolFiber;
pub use stub::StubFiber;
pub use thread::ThreadFiber;
