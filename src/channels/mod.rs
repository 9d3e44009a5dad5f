//! # Typed channels over fibers.
//!
//! Channels deliver messages *into subscriber fibers' queues*; they own no
//! threads of their own. Four delivery shapes share the subscription
//! machinery:
//!
//! - [`Channel`] — broadcast: every subscriber sees every message.
//! - [`QueueChannel`] — competing consumers: each message goes to exactly
//!   one of N subscribers.
//! - [`RequestChannel`] — request/reply, with a blocking and a callback
//!   receive side.
//! - [`SnapshotChannel`] — state snapshot on subscribe, then incremental
//!   deltas with no gap and no duplicate.

mod channel;
mod port;
mod queue;
mod request;
mod snapshot;
mod subscription;

pub use channel::Channel;
pub use port::{MessageHandler, PublisherPort, RequestPort, SnapshotPort, SubscriberPort};
pub use queue::QueueChannel;
pub use request::{PendingReply, Request, RequestChannel};
pub use snapshot::SnapshotChannel;
pub use subscription::Subscription;

pub(crate) use port::DirectSubscribe;
