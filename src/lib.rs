//! # fibra
//!
//! **fibra** is a fiber/channel concurrency library for Rust.
//!
//! Producers and consumers communicate without shared-state locking: every
//! stateful component is owned by exactly one *fiber* (a serialized
//! execution context), and cross-fiber communication happens only by
//! enqueueing closures onto a fiber's private action queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  Publishers (any thread):              Subscribers (each on a fiber):
//!
//!   publish(msg) ──► Channel ───────► [fiber A queue] ─► handler(msg)
//!                      │  (fan-out)   [fiber B queue] ─► handler(msg)
//!                      │
//!   publish(msg) ──► QueueChannel ──► one winning fiber ─► handler(msg)
//!                      (competing)
//!
//!   send_request ──► RequestChannel ─► handler fiber ─► reply(..)
//!        │                                               │
//!        └── receive(timeout) ◄─── monitor wait ◄────────┘
//!
//!   subscribe ────► SnapshotChannel ─► owning fiber:
//!                                        snapshot() + delta registration
//!                                        in ONE serialized action
//! ```
//!
//! ### Execution strategies
//! One fiber contract ([`Fiber`]), three implementations picked per
//! workload ([`FiberKind`]):
//!
//! | Strategy       | Threading                                  | Use for                          |
//! |----------------|--------------------------------------------|----------------------------------|
//! | [`ThreadFiber`]| one private worker thread                  | latency-sensitive, steady load   |
//! | [`PoolFiber`]  | batches on the shared tokio pool           | many mostly-idle fibers          |
//! | [`StubFiber`]  | inline on the calling thread               | deterministic tests, one producer|
//!
//! Everything enqueued to one fiber runs strictly one-at-a-time in enqueue
//! order; there is no cross-fiber ordering. A panicking action is contained
//! by the [`Executor`] and surfaced through its fault hook; the batch and
//! the fiber keep going.
//!
//! ## Features
//! | Area             | Description                                              | Key types                                  |
//! |------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Fibers**       | Serialized execution contexts, three strategies.         | [`Fiber`], [`spawn_fiber`], [`FiberConfig`]|
//! | **Channels**     | Broadcast, competing-consumer, request/reply, snapshot.  | [`Channel`], [`QueueChannel`], [`RequestChannel`], [`SnapshotChannel`] |
//! | **Scheduling**   | One-shot/recurring delivery onto fibers.                 | [`Scheduler`], [`TimerHandle`]             |
//! | **Rate limiting**| Coalescing and batching subscriptions.                   | [`Channel::subscribe_to_last`], [`Channel::subscribe_to_batch`] |
//! | **Event bus**    | Process-wide channel per message type.                   | [`bus`]                                    |
//! | **Agents**       | Fiber + channel + handler in one unit.                   | [`Agent`], [`ChannelAgent`]                |
//! | **Collections**  | Fiber-owned, observable, queryable containers.           | [`FiberCollection`], [`FiberKeyedCollection`] |
//! | **Errors**       | Construction and receive outcomes, never panics.         | [`ConfigError`], [`ReceiveError`]          |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use fibra::{Channel, Fiber, PoolFiber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fiber = PoolFiber::start_new().expect("inside a runtime");
//!     let prices: Channel<u64> = Channel::new();
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let _sub = prices.subscribe(&fiber, move |price| {
//!         let _ = tx.send(price);
//!     });
//!
//!     prices.publish(101);
//!     prices.publish(102);
//!     assert_eq!(rx.recv().await, Some(101));
//!     assert_eq!(rx.recv().await, Some(102));
//!
//!     // bounded-rate variant: one delivery per window, latest value wins
//!     let _throttled = prices.subscribe_to_last(&fiber, Duration::from_millis(100), |p| {
//!         println!("latest: {p}");
//!     });
//!
//!     fiber.dispose();
//! }
//! ```
//!
//! ## Blocking rules
//! The only intentionally blocking call is [`PendingReply::receive`]; make
//! it from plain threads, never from a fiber's own handler or an async
//! task. Everything else — publish, enqueue, schedule — hands work off and
//! returns.

mod agents;
pub mod bus;
mod channels;
mod collections;
mod config;
mod error;
mod executor;
mod fibers;
mod scheduler;
mod subscribers;
mod sync;

// ---- Public re-exports ----

pub use agents::{Agent, ChannelAgent};
pub use channels::{
    Channel, MessageHandler, PendingReply, PublisherPort, QueueChannel, Request, RequestChannel,
    RequestPort, SnapshotChannel, SnapshotPort, SubscriberPort, Subscription,
};
pub use collections::{
    FiberCollection, FiberKeyedCollection, ItemAction, ItemActionKind, Predicate,
};
pub use config::{FiberConfig, FiberKind};
pub use error::{ConfigError, ReceiveError};
pub use executor::{ActionFault, Execute, Executor, ExecutorRef, FaultHook};
pub use fibers::{
    spawn_fiber, spawn_fiber_with, Action, Fiber, FiberRef, PoolFiber, RepeatAction, StubFiber,
    ThreadFiber,
};
pub use scheduler::{Scheduler, TimerHandle};
