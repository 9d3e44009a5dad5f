//! # Process-wide typed event bus.
//!
//! One well-known broadcast [`Channel`] per message type, reachable without
//! explicit wiring: `bus::publish(OrderFilled { .. })` reaches every
//! `bus::subscribe::<OrderFilled>(..)` in the process.
//!
//! ## Rules
//! - The registry is an explicit lazy map keyed by `TypeId` — channels are
//!   created on first touch, never by static initializers, so there is no
//!   init-order or teardown-order dependency to trip over.
//! - Channels live for the remainder of the process once created. There is
//!   no teardown; subscriptions die with their fibers as usual.
//! - Prefer an explicitly passed [`Channel`] where wiring is practical; the
//!   bus is for cross-cutting messages where threading a channel through
//!   every constructor costs more than it buys.
//!
//! ## Example
//! ```
//! use fibra::{bus, Fiber, PoolFiber};
//!
//! #[derive(Clone)]
//! struct Tick(u64);
//!
//! #[tokio::main]
//! async fn main() {
//!     let fiber = PoolFiber::start_new().expect("runtime running");
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let _sub = bus::subscribe(&fiber, move |t: Tick| {
//!         let _ = tx.send(t.0);
//!     });
//!     bus::publish(Tick(42));
//!     assert_eq!(rx.recv().await, Some(42));
//!     fiber.dispose();
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::channels::{Channel, Subscription};
use crate::fibers::FiberRef;

static REGISTRY: Lazy<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The process-wide channel for `T`, created on first touch.
pub fn channel<T>() -> Channel<T>
where
    T: Clone + Send + 'static,
{
    let mut registry = REGISTRY.lock();
    let entry = registry
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Channel::<T>::new()));
    match entry.downcast_ref::<Channel<T>>() {
        Some(existing) => existing.clone(),
        None => {
            let fresh = Channel::<T>::new();
            *entry = Box::new(fresh.clone());
            fresh
        }
    }
}

/// Publishes onto the process-wide channel for `T`.
pub fn publish<T>(message: T)
where
    T: Clone + Send + 'static,
{
    channel::<T>().publish(message);
}

/// Subscribes `on_message` (on `fiber`) to the process-wide channel for `T`.
pub fn subscribe<T, F>(fiber: &FiberRef, on_message: F) -> Subscription
where
    T: Clone + Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    channel::<T>().subscribe(fiber, on_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fibers::StubFiber;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // the registry is process-global and tests run in parallel, so every
    // test gets message types of its own
    #[derive(Clone)]
    struct Counted(u32);

    #[derive(Clone)]
    struct IsoPing(u32);

    #[derive(Clone)]
    struct IsoPong(u32);

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().expect("runtime")
    }

    #[test]
    fn test_same_type_reaches_same_channel() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = StubFiber::start_new().expect("fiber");

        let seen = Arc::new(AtomicUsize::new(0));
        let sub = {
            let seen = Arc::clone(&seen);
            subscribe(&fiber, move |Counted(n)| {
                seen.fetch_add(n as usize, Ordering::SeqCst);
            })
        };

        publish(Counted(2));
        publish(Counted(3));
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        sub.dispose();
        fiber.dispose();
    }

    #[test]
    fn test_types_are_isolated() {
        let rt = runtime();
        let _guard = rt.enter();
        let fiber = StubFiber::start_new().expect("fiber");

        let pongs = Arc::new(AtomicUsize::new(0));
        let sub = {
            let pongs = Arc::clone(&pongs);
            subscribe(&fiber, move |_: IsoPong| {
                pongs.fetch_add(1, Ordering::SeqCst);
            })
        };

        publish(IsoPing(1));
        assert_eq!(pongs.load(Ordering::SeqCst), 0);
        publish(IsoPong(1));
        assert_eq!(pongs.load(Ordering::SeqCst), 1);
        sub.dispose();
        fiber.dispose();
    }
}
