//! # Snapshot + incremental channel.
//!
//! A subscriber joining mid-stream needs the current state once, then every
//! change after it — no gap, no duplicate. [`SnapshotChannel`] gets this
//! from fiber serialization rather than versioning: the priming request
//! handler runs **on the owning fiber** (the same fiber that applies all
//! mutations), and in that one action it both registers the subscriber's
//! delta subscription and produces the snapshot. No mutation can interleave,
//! so the snapshot reflects exactly the state the delta stream continues
//! from.
//!
//! ```text
//! subscriber fiber                     owning fiber
//!   subscribe ──priming request──►  ┌─ register delta sub ─┐ one
//!                                   └─ snapshot() → reply ─┘ action
//!   on_snapshot ◄──reply channel────          │
//!   on_delta    ◄──delta channel────  publish(delta) from later actions
//! ```
//!
//! Producers must call [`SnapshotChannel::reply_to_priming_request`] before
//! subscribers arrive; a subscribe with no producer bound delivers nothing.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channels::port::{MessageHandler, SnapshotPort};
use crate::channels::{Channel, Request, RequestChannel, Subscription};
use crate::fibers::FiberRef;

/// Broadcast of `D` deltas with a one-time `S` snapshot on subscribe.
///
/// Cloning yields another handle to the same channel.
pub struct SnapshotChannel<D, S> {
    updates: Channel<D>,
    requests: RequestChannel<Priming<D>, S>,
}

impl<D, S> Clone for SnapshotChannel<D, S> {
    fn clone(&self) -> Self {
        Self {
            updates: self.updates.clone(),
            requests: self.requests.clone(),
        }
    }
}

/// What a subscriber hands the owning fiber: where deltas should go.
struct Priming<D> {
    fiber: FiberRef,
    on_delta: MessageHandler<D>,
    token: CancellationToken,
}

impl<D> Clone for Priming<D> {
    fn clone(&self) -> Self {
        Self {
            fiber: FiberRef::clone(&self.fiber),
            on_delta: Arc::clone(&self.on_delta),
            token: self.token.clone(),
        }
    }
}

impl<D, S> Default for SnapshotChannel<D, S>
where
    D: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D, S> SnapshotChannel<D, S>
where
    D: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            updates: Channel::new(),
            requests: RequestChannel::new(),
        }
    }

    /// Publishes a delta to all primed subscribers.
    ///
    /// Call this only from actions on the owning fiber — the ordering
    /// guarantee is exactly as strong as that discipline.
    pub fn publish(&self, delta: D) {
        self.updates.publish(delta);
    }

    /// Binds `snapshot` to run on `fiber` — the owning fiber, the one all
    /// mutations are enqueued to — for every priming request.
    pub fn reply_to_priming_request<F>(&self, fiber: &FiberRef, snapshot: F) -> Subscription
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let updates = self.updates.clone();
        self.requests
            .set_request_handler(fiber, move |request: Request<Priming<D>, S>| {
                let priming = request.payload().clone();
                updates.subscribe_with_token(priming.token, priming.fiber, priming.on_delta);
                request.reply(snapshot());
            })
    }

    /// Subscribes on `fiber`: `on_snapshot` fires exactly once with the
    /// primed state, then `on_delta` fires for every subsequent delta, in
    /// order. Disposing the result detaches both halves.
    pub fn subscribe<FD, FS>(&self, fiber: &FiberRef, on_delta: FD, on_snapshot: FS) -> Subscription
    where
        FD: Fn(D) + Send + Sync + 'static,
        FS: Fn(S) + Send + Sync + 'static,
    {
        self.subscribe_primed(fiber, Arc::new(on_delta), Arc::new(on_snapshot))
    }

    /// [`subscribe`](Self::subscribe) with pre-built handlers.
    pub fn subscribe_primed(
        &self,
        fiber: &FiberRef,
        on_delta: MessageHandler<D>,
        on_snapshot: MessageHandler<S>,
    ) -> Subscription {
        let delta_token = fiber.cancellation().child_token();
        let priming = Priming {
            fiber: FiberRef::clone(fiber),
            on_delta,
            token: delta_token.clone(),
        };
        let snapshot_sub = self
            .requests
            .send_request_handler(priming, fiber, on_snapshot);
        Subscription::join([Subscription::from_token(delta_token), snapshot_sub])
    }
}

impl<D, S> SnapshotPort<D, S> for SnapshotChannel<D, S>
where
    D: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn subscribe_primed(
        &self,
        fiber: &FiberRef,
        on_delta: MessageHandler<D>,
        on_snapshot: MessageHandler<S>,
    ) -> Subscription {
        SnapshotChannel::subscribe_primed(self, fiber, on_delta, on_snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fibers::{PoolFiber, ThreadFiber};
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().expect("runtime")
    }

    /// Replayable view a subscriber builds from [snapshot, deltas…].
    #[derive(Default)]
    struct Replay {
        snapshot: Option<Vec<u32>>,
        deltas: Vec<u32>,
    }

    impl Replay {
        fn materialize(&self) -> Vec<u32> {
            let mut state = self.snapshot.clone().unwrap_or_default();
            state.extend(self.deltas.iter().copied());
            state
        }
    }

    #[test]
    fn test_snapshot_arrives_before_deltas() {
        let rt = runtime();
        let _guard = rt.enter();
        let owner = ThreadFiber::start_new().expect("owner");
        let subscriber = ThreadFiber::start_new().expect("subscriber");
        let channel: SnapshotChannel<u32, Vec<u32>> = SnapshotChannel::new();

        let state = Arc::new(Mutex::new(Vec::new()));
        let _producer = {
            let state = Arc::clone(&state);
            channel.reply_to_priming_request(&owner, move || state.lock().clone())
        };

        // seed some state through the owner
        for n in 0..5u32 {
            let state = Arc::clone(&state);
            let channel = channel.clone();
            owner.enqueue(Box::new(move || {
                state.lock().push(n);
                channel.publish(n);
            }));
        }

        let replay = Arc::new(Mutex::new(Replay::default()));
        let _sub = {
            let r1 = Arc::clone(&replay);
            let r2 = Arc::clone(&replay);
            channel.subscribe(
                &subscriber,
                move |delta| {
                    let mut r = r1.lock();
                    assert!(r.snapshot.is_some(), "delta before snapshot");
                    r.deltas.push(delta);
                },
                move |snapshot| {
                    let mut r = r2.lock();
                    assert!(r.snapshot.is_none(), "snapshot delivered twice");
                    r.snapshot = Some(snapshot);
                },
            )
        };

        // more mutations after the subscribe
        for n in 5..10u32 {
            let state = Arc::clone(&state);
            let channel = channel.clone();
            owner.enqueue(Box::new(move || {
                state.lock().push(n);
                channel.publish(n);
            }));
        }

        let expected: Vec<u32> = (0..10).collect();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if replay.lock().materialize() == expected {
                break;
            }
            assert!(Instant::now() < deadline, "replay never converged");
            std::thread::sleep(Duration::from_millis(10));
        }
        owner.dispose();
        subscriber.dispose();
    }

    #[test]
    fn test_replay_matches_direct_query_under_concurrent_mutation() {
        let rt = runtime();
        let _guard = rt.enter();
        let owner = ThreadFiber::start_new().expect("owner");
        let subscriber = PoolFiber::start_new().expect("subscriber");
        let channel: SnapshotChannel<u32, Vec<u32>> = SnapshotChannel::new();
        let queries: RequestChannel<(), Vec<u32>> = RequestChannel::new();

        let state = Arc::new(Mutex::new(Vec::new()));
        let _producer = {
            let state = Arc::clone(&state);
            channel.reply_to_priming_request(&owner, move || state.lock().clone())
        };
        let _query_handler = {
            let state = Arc::clone(&state);
            queries.set_request_handler(&owner, move |req| req.reply(state.lock().clone()))
        };

        // mutate from another thread while the subscribe races in
        let mutator = {
            let owner = FiberRef::clone(&owner);
            let state = Arc::clone(&state);
            let channel = channel.clone();
            std::thread::spawn(move || {
                for n in 0..200u32 {
                    let state = Arc::clone(&state);
                    let channel = channel.clone();
                    owner.enqueue(Box::new(move || {
                        state.lock().push(n);
                        channel.publish(n);
                    }));
                    if n % 50 == 0 {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
            })
        };

        std::thread::sleep(Duration::from_millis(2));
        let replay = Arc::new(Mutex::new(Replay::default()));
        let _sub = {
            let r1 = Arc::clone(&replay);
            let r2 = Arc::clone(&replay);
            channel.subscribe(
                &subscriber,
                move |delta| r1.lock().deltas.push(delta),
                move |snapshot| r2.lock().snapshot = Some(snapshot),
            )
        };
        mutator.join().expect("mutator");

        // all 200 mutations are on the owner's queue; query behind them
        let end_state = queries
            .send_request(())
            .receive(Duration::from_secs(5))
            .expect("query");
        assert_eq!(end_state, (0..200).collect::<Vec<_>>());

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if replay.lock().materialize() == end_state {
                break;
            }
            assert!(Instant::now() < deadline, "gap or duplicate in replay");
            std::thread::sleep(Duration::from_millis(10));
        }
        owner.dispose();
        subscriber.dispose();
    }

    #[test]
    fn test_disposed_subscription_stops_deltas() {
        let rt = runtime();
        let _guard = rt.enter();
        let owner = ThreadFiber::start_new().expect("owner");
        let subscriber = ThreadFiber::start_new().expect("subscriber");
        let channel: SnapshotChannel<u32, Vec<u32>> = SnapshotChannel::new();

        let _producer = channel.reply_to_priming_request(&owner, Vec::new);

        let replay = Arc::new(Mutex::new(Replay::default()));
        let sub = {
            let r1 = Arc::clone(&replay);
            let r2 = Arc::clone(&replay);
            channel.subscribe(
                &subscriber,
                move |delta| r1.lock().deltas.push(delta),
                move |snapshot| r2.lock().snapshot = Some(snapshot),
            )
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while replay.lock().snapshot.is_none() {
            assert!(Instant::now() < deadline, "snapshot never arrived");
            std::thread::sleep(Duration::from_millis(5));
        }

        sub.dispose();
        channel.publish(99);
        std::thread::sleep(Duration::from_millis(150));
        assert!(replay.lock().deltas.is_empty());
        owner.dispose();
        subscriber.dispose();
    }
}
