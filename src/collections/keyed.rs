//! Keyed variant of the fiber-owned collections.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::channels::{
    Channel, MessageHandler, PendingReply, RequestChannel, RequestPort, SnapshotChannel,
    SnapshotPort, Subscription,
};
use crate::collections::{ItemAction, Predicate};
use crate::error::{ConfigError, ReceiveError};
use crate::fibers::{FiberRef, PoolFiber};

/// A `HashMap<K, T>` owned by a private fiber, keyed by a function of the
/// item. Re-adding an existing key emits `Updated` instead of `Added`.
pub struct FiberKeyedCollection<K, T> {
    fiber: FiberRef,
    add: Channel<T>,
    remove: Channel<T>,
    snapshots: SnapshotChannel<ItemAction<T>, Vec<T>>,
    requests: RequestChannel<Predicate<T>, Vec<T>>,
    _marker: std::marker::PhantomData<fn(K)>,
}

impl<K, T> FiberKeyedCollection<K, T>
where
    K: Eq + Hash + Send + 'static,
    T: Clone + Send + 'static,
{
    /// Builds the collection on a fresh pool fiber; `key_of` derives each
    /// item's identity.
    pub fn new<F>(key_of: F) -> Result<Self, ConfigError>
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let fiber = PoolFiber::start_new()?;
        let key_of = Arc::new(key_of);
        let items: Arc<Mutex<HashMap<K, T>>> = Arc::new(Mutex::new(HashMap::new()));
        let add = Channel::new();
        let remove = Channel::new();
        let snapshots: SnapshotChannel<ItemAction<T>, Vec<T>> = SnapshotChannel::new();
        let requests: RequestChannel<Predicate<T>, Vec<T>> = RequestChannel::new();

        let _priming = {
            let items = Arc::clone(&items);
            snapshots.reply_to_priming_request(&fiber, move || {
                items.lock().values().cloned().collect()
            })
        };
        let _on_add = {
            let items = Arc::clone(&items);
            let key_of = Arc::clone(&key_of);
            let snapshots = snapshots.clone();
            add.subscribe(&fiber, move |item: T| {
                let existed = items.lock().insert(key_of(&item), item.clone()).is_some();
                snapshots.publish(if existed {
                    ItemAction::updated(item)
                } else {
                    ItemAction::added(item)
                });
            })
        };
        let _on_remove = {
            let items = Arc::clone(&items);
            let key_of = Arc::clone(&key_of);
            let snapshots = snapshots.clone();
            remove.subscribe(&fiber, move |item: T| {
                let removed = items.lock().remove(&key_of(&item)).is_some();
                if removed {
                    snapshots.publish(ItemAction::removed(item));
                }
            })
        };
        let _on_query = {
            let items = Arc::clone(&items);
            requests.set_request_handler(&fiber, move |request| {
                let matched = {
                    let items = items.lock();
                    items
                        .values()
                        .filter(|item| (request.payload())(item))
                        .cloned()
                        .collect::<Vec<_>>()
                };
                request.reply(matched);
            })
        };

        Ok(Self {
            fiber,
            add,
            remove,
            snapshots,
            requests,
            _marker: std::marker::PhantomData,
        })
    }

    /// Queues an insert-or-update under the item's key.
    pub fn add(&self, item: T) {
        self.add.publish(item);
    }

    /// Queues removal of the entry whose key matches `item`'s key.
    pub fn remove(&self, item: T) {
        self.remove.publish(item);
    }

    /// Snapshot-then-deltas subscription. Snapshot ordering follows map
    /// iteration and is unspecified.
    pub fn subscribe<FD, FS>(
        &self,
        fiber: &FiberRef,
        on_delta: FD,
        on_snapshot: FS,
    ) -> Subscription
    where
        FD: Fn(ItemAction<T>) + Send + Sync + 'static,
        FS: Fn(Vec<T>) + Send + Sync + 'static,
    {
        self.snapshots.subscribe(fiber, on_delta, on_snapshot)
    }

    /// Blocking predicate query through the owning fiber.
    pub fn items_where<P>(&self, predicate: P, timeout: Duration) -> Result<Vec<T>, ReceiveError>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.requests
            .send_request(Arc::new(predicate))
            .receive(timeout)
    }

    /// Tears down the owning fiber; pending mutations may be dropped.
    pub fn dispose(&self) {
        self.fiber.dispose();
    }
}

impl<K, T> SnapshotPort<ItemAction<T>, Vec<T>> for FiberKeyedCollection<K, T>
where
    K: Eq + Hash + Send + 'static,
    T: Clone + Send + 'static,
{
    fn subscribe_primed(
        &self,
        fiber: &FiberRef,
        on_delta: MessageHandler<ItemAction<T>>,
        on_snapshot: MessageHandler<Vec<T>>,
    ) -> Subscription {
        self.snapshots.subscribe_primed(fiber, on_delta, on_snapshot)
    }
}

impl<K, T> RequestPort<Predicate<T>, Vec<T>> for FiberKeyedCollection<K, T>
where
    K: Eq + Hash + Send + 'static,
    T: Clone + Send + 'static,
{
    fn send_request(&self, request: Predicate<T>) -> PendingReply<Vec<T>> {
        self.requests.send_request(request)
    }

    fn send_request_handler(
        &self,
        request: Predicate<T>,
        fiber: &FiberRef,
        on_reply: MessageHandler<Vec<T>>,
    ) -> Subscription {
        self.requests.send_request_handler(request, fiber, on_reply)
    }
}
