//! # Agents: a fiber, a channel and a handler in one disposable unit.
//!
//! The pattern "private state, mutated only by messages" recurs often enough
//! to deserve a shorthand. An agent owns its pool fiber; state captured by
//! the handler is touched from that fiber alone, so the handler needs no
//! locking of its own.

use std::marker::PhantomData;

use crate::channels::Channel;
use crate::error::ConfigError;
use crate::fibers::{FiberRef, PoolFiber};

/// Message-driven worker with a private channel and fiber.
///
/// # Example
/// ```
/// use fibra::Agent;
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
///     let greeter = Agent::new(move |name: &'static str| {
///         let _ = tx.send(format!("hello, {name}"));
///     })
///     .expect("runtime running");
///
///     greeter.send("fiber");
///     assert_eq!(rx.recv().await.as_deref(), Some("hello, fiber"));
///     greeter.dispose();
/// }
/// ```
pub struct Agent<T> {
    channel: Channel<T>,
    fiber: FiberRef,
}

impl<T> Agent<T>
where
    T: Clone + Send + 'static,
{
    /// Spawns a pool fiber and wires `on_message` to a private channel.
    pub fn new<F>(on_message: F) -> Result<Self, ConfigError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let fiber = PoolFiber::start_new()?;
        let channel = Channel::new();
        let _registration = channel.subscribe(&fiber, on_message);
        Ok(Self { channel, fiber })
    }

    /// Sends a message to the agent's handler.
    pub fn send(&self, message: T) {
        self.channel.publish(message);
    }

    /// Tears down the agent's fiber (and with it the handler registration).
    pub fn dispose(&self) {
        self.fiber.dispose();
    }
}

/// A handler attached to an **existing** channel on its own private fiber.
///
/// Useful when several independent consumers should each get their own
/// serialization context without sharing one fiber.
pub struct ChannelAgent<T> {
    fiber: FiberRef,
    _marker: PhantomData<fn(T)>,
}

impl<T> ChannelAgent<T>
where
    T: Clone + Send + 'static,
{
    /// Spawns a pool fiber and subscribes `on_message` to `channel`.
    pub fn new<F>(channel: &Channel<T>, on_message: F) -> Result<Self, ConfigError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let fiber = PoolFiber::start_new()?;
        let _registration = channel.subscribe(&fiber, on_message);
        Ok(Self {
            fiber,
            _marker: PhantomData,
        })
    }

    /// Tears down the agent's fiber, detaching it from the channel.
    pub fn dispose(&self) {
        self.fiber.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().expect("runtime")
    }

    #[test]
    fn test_agent_handler_owns_its_state() {
        let rt = runtime();
        let _guard = rt.enter();

        // running total lives inside the handler; no external locking
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let total = Mutex::new(0u64);
        let summer = Agent::new(move |n: u64| {
            let mut total = total.lock();
            *total += n;
            let _ = tx.lock().send(*total);
        })
        .expect("agent");

        for n in 1..=4 {
            summer.send(n);
        }
        let mut last = 0;
        for _ in 0..4 {
            last = rx.recv_timeout(Duration::from_secs(5)).expect("delivery");
        }
        assert_eq!(last, 10);
        summer.dispose();
    }

    #[test]
    fn test_channel_agents_fan_out_from_one_channel() {
        let rt = runtime();
        let _guard = rt.enter();
        let channel = Channel::new();

        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Arc::new(Mutex::new(tx));
        let agents: Vec<_> = (0..3)
            .map(|id| {
                let tx = Arc::clone(&tx);
                ChannelAgent::new(&channel, move |n: u32| {
                    let _ = tx.lock().send((id, n));
                })
                .expect("agent")
            })
            .collect();

        channel.publish(5);
        let mut seen: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("delivery"))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 5), (1, 5), (2, 5)]);

        for agent in &agents {
            agent.dispose();
        }
    }

    #[test]
    fn test_disposed_agent_ignores_sends() {
        let rt = runtime();
        let _guard = rt.enter();
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let agent = Agent::new(move |n: u32| {
            let _ = tx.lock().send(n);
        })
        .expect("agent");

        agent.send(1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(1));

        agent.dispose();
        agent.send(2);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
