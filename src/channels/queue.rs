//! # Competing-consumer channel.
//!
//! One shared FIFO of pending messages, N subscriber fibers competing for
//! them. Every published message is processed by **exactly one** subscriber:
//! publish appends to the queue and signals all live consumers; each signal
//! is a "try to pop" action on that consumer's fiber, and popping is atomic
//! under the queue lock, so one fiber wins and the rest find nothing.
//!
//! Which consumer wins is unspecified — the invariant is only that the sum
//! of handler invocations equals the number of publishes. The signal-all
//! pattern means every subscriber wakes per message; with many consumers a
//! wake-one strategy would be a compatible optimization, but signal-all
//! keeps the hand-off path trivial and latency low for small N.
//!
//! Messages are moved, not cloned: `T` needs no `Clone` here.
//!
//! Messages published while no consumer existed park in the queue; a new
//! subscriber is signaled once per parked message so the backlog drains
//! without waiting for future publishes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::channels::channel::{Delivery, Registration};
use crate::channels::port::{DirectSubscribe, MessageHandler, PublisherPort, SubscriberPort};
use crate::channels::Subscription;
use crate::fibers::FiberRef;
use crate::subscribers;

/// Channel where each message is consumed by exactly one subscriber.
pub struct QueueChannel<T> {
    shared: Arc<QueueShared<T>>,
}

struct QueueShared<T> {
    queue: Mutex<VecDeque<T>>,
    consumers: Mutex<Vec<Registration<T>>>,
}

impl<T> QueueShared<T> {
    fn pop(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }
}

impl<T> Clone for QueueChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for QueueChannel<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueChannel<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            shared: Arc::new(QueueShared {
                queue: Mutex::new(VecDeque::new()),
                consumers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a competing consumer running `on_message` on `fiber`.
    pub fn subscribe<F>(&self, fiber: &FiberRef, on_message: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_handler(fiber, Arc::new(on_message))
    }

    /// [`subscribe`](Self::subscribe) with a pre-built handler.
    pub fn subscribe_handler(&self, fiber: &FiberRef, handler: MessageHandler<T>) -> Subscription {
        let token = fiber.cancellation().child_token();
        let registration = Registration {
            token: token.clone(),
            delivery: Delivery::Fiber(FiberRef::clone(fiber)),
            handler,
        };
        self.shared.consumers.lock().push(registration.clone());
        // catch-up signals: messages published before any consumer existed
        // would otherwise wait for future publishes
        let backlog = self.shared.queue.lock().len();
        for _ in 0..backlog {
            self.signal(&registration);
        }
        Subscription::from_token(token)
    }

    /// Coalescing consumer: see [`Channel::subscribe_to_last`]
    /// (crate::Channel::subscribe_to_last). Competing semantics still hold:
    /// only messages this consumer won are coalesced.
    pub fn subscribe_to_last<F>(
        &self,
        fiber: &FiberRef,
        interval: Duration,
        on_message: F,
    ) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        subscribers::attach_last(self, fiber, interval, Arc::new(on_message))
    }

    /// Batching consumer over the messages this consumer wins.
    pub fn subscribe_to_batch<F>(
        &self,
        fiber: &FiberRef,
        interval: Duration,
        on_batch: F,
    ) -> Subscription
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        subscribers::attach_batch(self, fiber, interval, Arc::new(on_batch))
    }

    /// Appends `message` to the shared queue and signals every live
    /// consumer fiber to attempt a pop.
    pub fn publish(&self, message: T) {
        self.shared.queue.lock().push_back(message);
        let consumers = {
            let mut consumers = self.shared.consumers.lock();
            consumers.retain(|c| !c.token.is_cancelled());
            consumers.clone()
        };
        for consumer in &consumers {
            self.signal(consumer);
        }
    }

    /// One "try to pop" hand-off for one consumer.
    fn signal(&self, consumer: &Registration<T>) {
        match &consumer.delivery {
            Delivery::Fiber(fiber) => {
                let shared = Arc::clone(&self.shared);
                let token = consumer.token.clone();
                let handler = Arc::clone(&consumer.handler);
                fiber.enqueue(Box::new(move || {
                    if token.is_cancelled() {
                        return;
                    }
                    let popped = shared.pop();
                    if let Some(msg) = popped {
                        handler(msg);
                    }
                }));
            }
            Delivery::Publisher => {
                if consumer.token.is_cancelled() {
                    return;
                }
                let popped = self.shared.pop();
                if let Some(msg) = popped {
                    (consumer.handler)(msg);
                }
            }
        }
    }

    /// Number of messages published but not yet won by any consumer.
    pub fn pending_len(&self) -> usize {
        self.shared.queue.lock().len()
    }
}

impl<T> PublisherPort<T> for QueueChannel<T>
where
    T: Send + 'static,
{
    fn publish(&self, message: T) {
        QueueChannel::publish(self, message);
    }
}

impl<T> SubscriberPort<T> for QueueChannel<T>
where
    T: Send + 'static,
{
    fn subscribe_handler(&self, fiber: &FiberRef, handler: MessageHandler<T>) -> Subscription {
        QueueChannel::subscribe_handler(self, fiber, handler)
    }
}

impl<T> DirectSubscribe<T> for QueueChannel<T>
where
    T: Send + 'static,
{
    fn subscribe_direct(&self, token: CancellationToken, handler: MessageHandler<T>) {
        let registration = Registration {
            token,
            delivery: Delivery::Publisher,
            handler,
        };
        self.shared.consumers.lock().push(registration.clone());
        let backlog = self.shared.queue.lock().len();
        for _ in 0..backlog {
            self.signal(&registration);
        }
    }
}
