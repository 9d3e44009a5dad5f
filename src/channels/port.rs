//! # Port contracts.
//!
//! The channel types implement small trait "ports" so that components can
//! depend on a capability (publish, subscribe, request, primed-subscribe)
//! instead of a concrete channel. External collaborators are expected to
//! implement the same shapes — e.g. a wire bridge exposing [`RequestPort`]
//! over a socket — which is why the required methods are object-safe and
//! take [`MessageHandler`]s rather than generic closures.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channels::{PendingReply, Subscription};
use crate::fibers::FiberRef;

/// Subscriber callback invoked with each delivered message.
pub type MessageHandler<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Accepts messages for delivery.
pub trait PublisherPort<T> {
    /// Hands the message to the port. Non-blocking: returns once delivery
    /// is queued, not once handlers ran.
    fn publish(&self, message: T);
}

/// Source of messages that subscribers receive on a fiber of their choice.
pub trait SubscriberPort<T> {
    /// Registers `handler` to run on `fiber` for delivered messages.
    fn subscribe_handler(&self, fiber: &FiberRef, handler: MessageHandler<T>) -> Subscription;

    /// Closure-friendly form of [`subscribe_handler`](Self::subscribe_handler).
    fn subscribe<F>(&self, fiber: &FiberRef, on_message: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
        Self: Sized,
    {
        self.subscribe_handler(fiber, Arc::new(on_message))
    }
}

/// Request/reply port: the shape the networking collaborator mirrors over a
/// wire transport (correlating replies by its own request identifiers).
pub trait RequestPort<Req, Rep> {
    /// Publishes a request whose reply is awaited by blocking the calling
    /// thread via [`PendingReply::receive`](crate::PendingReply::receive).
    fn send_request(&self, request: Req) -> PendingReply<Rep>;

    /// Publishes a request whose reply is delivered to `on_reply` on
    /// `fiber`; disposing the subscription makes a late reply a no-op.
    fn send_request_handler(
        &self,
        request: Req,
        fiber: &FiberRef,
        on_reply: MessageHandler<Rep>,
    ) -> Subscription;
}

/// Snapshot-then-deltas port.
pub trait SnapshotPort<D, S> {
    /// Delivers the current snapshot once via `on_snapshot`, then every
    /// subsequent delta via `on_delta`, in order, with no gap or duplicate.
    fn subscribe_primed(
        &self,
        fiber: &FiberRef,
        on_delta: MessageHandler<D>,
        on_snapshot: MessageHandler<S>,
    ) -> Subscription;
}

/// Registration that invokes the handler in publisher context instead of
/// enqueueing onto a fiber. The batching subscribers use this: their
/// handlers only stash the message under a private lock, and the real
/// delivery happens later on the target fiber via a timer flush.
pub(crate) trait DirectSubscribe<T> {
    fn subscribe_direct(&self, token: CancellationToken, handler: MessageHandler<T>);
}
