//! # Broadcast channel.
//!
//! [`Channel`] fans every published message out to all current subscribers,
//! as a closure enqueued onto each subscriber's fiber. Publishing is
//! non-blocking and returns once the enqueues are done; when the handlers
//! actually run is each fiber's business.
//!
//! ## Delivery rules
//! - Subscribers present at publish time get the message; later subscribers
//!   do not (no replay).
//! - Unsubscribing mid-publish is safe and suppresses the in-flight
//!   message: the enqueued closure re-checks the subscription token before
//!   invoking the callback.
//! - The subscriber list lock is **not** held while enqueueing: a stub
//!   fiber runs the handler inline, and a handler that subscribes or
//!   publishes back into the channel must not deadlock.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::channels::port::{DirectSubscribe, MessageHandler, PublisherPort, SubscriberPort};
use crate::channels::Subscription;
use crate::fibers::FiberRef;
use crate::subscribers;

/// Where a subscription's handler runs.
#[derive(Clone)]
pub(crate) enum Delivery {
    /// Enqueued onto the subscriber's fiber (the normal case).
    Fiber(FiberRef),
    /// Invoked synchronously in publisher context (batching subscribers).
    Publisher,
}

pub(crate) struct Registration<T> {
    pub(crate) token: CancellationToken,
    pub(crate) delivery: Delivery,
    pub(crate) handler: MessageHandler<T>,
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            delivery: self.delivery.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Broadcast channel: every subscriber sees every message.
///
/// Cloning the channel clones a handle to the same subscriber set (the
/// publishing and subscribing sides usually live in different components).
pub struct Channel<T> {
    shared: Arc<ChannelShared<T>>,
}

struct ChannelShared<T> {
    subs: Mutex<Vec<Registration<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Channel<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                subs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers `on_message` to run on `fiber` for every publish.
    ///
    /// The returned [`Subscription`] removes exactly this pairing; the
    /// subscription also dies with the fiber.
    pub fn subscribe<F>(&self, fiber: &FiberRef, on_message: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_handler(fiber, Arc::new(on_message))
    }

    /// [`subscribe`](Self::subscribe) with a pre-built handler.
    pub fn subscribe_handler(&self, fiber: &FiberRef, handler: MessageHandler<T>) -> Subscription {
        let token = fiber.cancellation().child_token();
        self.register(Registration {
            token: token.clone(),
            delivery: Delivery::Fiber(FiberRef::clone(fiber)),
            handler,
        });
        Subscription::from_token(token)
    }

    /// Coalescing subscription: at most one delivery per `interval`,
    /// carrying only the latest message published within the window.
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

    /// Batching subscription: messages accumulate for `interval`, then the
    /// whole batch is delivered in arrival order.
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

    /// Fans `message` out to all live subscribers.
    pub fn publish(&self, message: T) {
        let targets = {
            let mut subs = self.shared.subs.lock();
            subs.retain(|s| !s.token.is_cancelled());
            subs.clone()
        };
        for sub in targets {
            let msg = message.clone();
            match sub.delivery {
                Delivery::Fiber(fiber) => {
                    let token = sub.token;
                    let handler = sub.handler;
                    fiber.enqueue(Box::new(move || {
                        if !token.is_cancelled() {
                            handler(msg);
                        }
                    }));
                }
                Delivery::Publisher => {
                    if !sub.token.is_cancelled() {
                        (sub.handler)(msg);
                    }
                }
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subs
            .lock()
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Registers a subscription whose lifetime is managed by the caller's
    /// token (snapshot priming registers delta subscriptions this way, from
    /// the owning fiber).
    pub(crate) fn subscribe_with_token(
        &self,
        token: CancellationToken,
        fiber: FiberRef,
        handler: MessageHandler<T>,
    ) {
        self.register(Registration {
            token,
            delivery: Delivery::Fiber(fiber),
            handler,
        });
    }

    fn register(&self, registration: Registration<T>) {
        self.shared.subs.lock().push(registration);
    }
}

impl<T> PublisherPort<T> for Channel<T>
where
    T: Clone + Send + 'static,
{
    fn publish(&self, message: T) {
        Channel::publish(self, message);
    }
}

impl<T> SubscriberPort<T> for Channel<T>
where
    T: Clone + Send + 'static,
{
    fn subscribe_handler(&self, fiber: &FiberRef, handler: MessageHandler<T>) -> Subscription {
        Channel::subscribe_handler(self, fiber, handler)
    }
}

impl<T> DirectSubscribe<T> for Channel<T>
where
    T: Clone + Send + 'static,
{
    fn subscribe_direct(&self, token: CancellationToken, handler: MessageHandler<T>) {
        self.register(Registration {
            token,
            delivery: Delivery::Publisher,
            handler,
        });
    }
}
