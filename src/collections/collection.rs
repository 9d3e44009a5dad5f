//! List variant of the fiber-owned collections.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::channels::{
    Channel, MessageHandler, PendingReply, RequestPort, SnapshotChannel, SnapshotPort,
    Subscription,
};
use crate::collections::{ItemAction, Predicate};
use crate::error::{ConfigError, ReceiveError};
use crate::channels::RequestChannel;
use crate::fibers::{FiberRef, PoolFiber};

/// A `Vec<T>` owned by a private fiber, observable as snapshot + deltas and
/// queryable by predicate.
///
/// `add`/`remove` publish onto internal channels whose handlers run on the
/// owning fiber; callers never touch the list directly.
pub struct FiberCollection<T> {
    fiber: FiberRef,
    add: Channel<T>,
    remove: Channel<T>,
    snapshots: SnapshotChannel<ItemAction<T>, Vec<T>>,
    requests: RequestChannel<Predicate<T>, Vec<T>>,
}

impl<T> FiberCollection<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Builds the collection on a fresh pool fiber.
    pub fn new() -> Result<Self, ConfigError> {
        let fiber = PoolFiber::start_new()?;
        let items: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::new()));
        let add = Channel::new();
        let remove = Channel::new();
        let snapshots: SnapshotChannel<ItemAction<T>, Vec<T>> = SnapshotChannel::new();
        let requests: RequestChannel<Predicate<T>, Vec<T>> = RequestChannel::new();

        // all four handlers run on `fiber`; the mutex is uncontended and
        // only satisfies the compiler's aliasing rules
        let _priming = {
            let items = Arc::clone(&items);
            snapshots.reply_to_priming_request(&fiber, move || items.lock().clone())
        };
        let _on_add = {
            let items = Arc::clone(&items);
            let snapshots = snapshots.clone();
            add.subscribe(&fiber, move |item: T| {
                items.lock().push(item.clone());
                snapshots.publish(ItemAction::added(item));
            })
        };
        let _on_remove = {
            let items = Arc::clone(&items);
            let snapshots = snapshots.clone();
            remove.subscribe(&fiber, move |item: T| {
                let removed = {
                    let mut items = items.lock();
                    match items.iter().position(|existing| *existing == item) {
                        Some(index) => {
                            items.remove(index);
                            true
                        }
                        None => false,
                    }
                };
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
                        .iter()
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
        })
    }

    /// Queues an append.
    pub fn add(&self, item: T) {
        self.add.publish(item);
    }

    /// Queues removal of the first item equal to `item` (no-op when absent).
    pub fn remove(&self, item: T) {
        self.remove.publish(item);
    }

    /// Snapshot-then-deltas subscription; see [`SnapshotChannel::subscribe`]
    /// (crate::SnapshotChannel::subscribe).
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

impl<T> SnapshotPort<ItemAction<T>, Vec<T>> for FiberCollection<T>
where
    T: Clone + PartialEq + Send + 'static,
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

impl<T> RequestPort<Predicate<T>, Vec<T>> for FiberCollection<T>
where
    T: Clone + PartialEq + Send + 'static,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::ItemActionKind;
    use crate::fibers::ThreadFiber;
    use std::time::Instant;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().expect("runtime")
    }

    #[test]
    fn test_query_sees_queued_mutations() {
        let rt = runtime();
        let _guard = rt.enter();
        let numbers = FiberCollection::new().expect("collection");

        for n in 0..10u32 {
            numbers.add(n);
        }
        numbers.remove(3);

        let evens = numbers
            .items_where(|n| n % 2 == 0, Duration::from_secs(5))
            .expect("query");
        assert_eq!(evens, vec![0, 2, 4, 6, 8]);

        let all = numbers
            .items_where(|_| true, Duration::from_secs(5))
            .expect("query");
        assert_eq!(all.len(), 9);
        numbers.dispose();
    }

    #[test]
    fn test_subscriber_replays_to_live_state() {
        let rt = runtime();
        let _guard = rt.enter();
        let numbers = FiberCollection::new().expect("collection");
        let observer = ThreadFiber::start_new().expect("observer");

        numbers.add(1u32);
        numbers.add(2);

        let view = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let v1 = Arc::clone(&view);
            let v2 = Arc::clone(&view);
            numbers.subscribe(
                &observer,
                move |delta| {
                    let mut view = v1.lock();
                    match delta.kind {
                        ItemActionKind::Added | ItemActionKind::Updated => view.push(delta.item),
                        ItemActionKind::Removed => view.retain(|i| *i != delta.item),
                    }
                },
                move |snapshot| *v2.lock() = snapshot,
            )
        };

        numbers.add(3);
        numbers.remove(1);

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if *view.lock() == vec![2, 3] {
                break;
            }
            assert!(Instant::now() < deadline, "view never converged");
            std::thread::sleep(Duration::from_millis(10));
        }
        numbers.dispose();
        observer.dispose();
    }

    #[test]
    fn test_collection_exposes_its_ports_as_objects() {
        let rt = runtime();
        let _guard = rt.enter();
        let numbers = FiberCollection::new().expect("collection");
        let observer = ThreadFiber::start_new().expect("observer");

        numbers.add(1u32);
        numbers.add(2);

        // consumers can hold the collection purely through its port shapes
        let queries: &dyn RequestPort<Predicate<u32>, Vec<u32>> = &numbers;
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Arc::new(Mutex::new(tx));
        let _pending = queries.send_request_handler(
            Arc::new(|n: &u32| *n > 1),
            &observer,
            Arc::new(move |matched: Vec<u32>| {
                let _ = tx.lock().send(matched);
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(vec![2]));

        let snapshots: &dyn SnapshotPort<ItemAction<u32>, Vec<u32>> = &numbers;
        let (snap_tx, snap_rx) = std::sync::mpsc::channel();
        let snap_tx = Arc::new(Mutex::new(snap_tx));
        let _sub = snapshots.subscribe_primed(
            &observer,
            Arc::new(|_delta: ItemAction<u32>| {}),
            Arc::new(move |snapshot: Vec<u32>| {
                let _ = snap_tx.lock().send(snapshot);
            }),
        );
        let mut primed = snap_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("snapshot");
        primed.sort_unstable();
        assert_eq!(primed, vec![1, 2]);

        numbers.dispose();
        observer.dispose();
    }

    #[test]
    fn test_removing_absent_item_emits_no_delta() {
        let rt = runtime();
        let _guard = rt.enter();
        let numbers = FiberCollection::new().expect("collection");
        let observer = ThreadFiber::start_new().expect("observer");

        let deltas = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let deltas = Arc::clone(&deltas);
            numbers.subscribe(
                &observer,
                move |delta: ItemAction<u32>| deltas.lock().push(delta),
                |_snapshot| {},
            )
        };

        numbers.remove(42);
        numbers.add(1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while deltas.lock().len() < 1 {
            assert!(Instant::now() < deadline, "delta never arrived");
            std::thread::sleep(Duration::from_millis(5));
        }
        let seen = deltas.lock().clone();
        assert_eq!(seen, vec![ItemAction::added(1)]);
        numbers.dispose();
        observer.dispose();
    }
}
