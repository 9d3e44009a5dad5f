//! # Request/reply channel.
//!
//! Pairs a request-publishing side with a handler-registering side through
//! an internal broadcast of [`Request`] objects. Two receive shapes:
//!
//! - **Blocking**: [`RequestChannel::send_request`] returns a
//!   [`PendingReply`] whose [`receive`](PendingReply::receive) parks the
//!   *calling thread* (never a fiber) under a monitor wait with a deadline.
//! - **Callback**: [`RequestChannel::send_request_to`] routes the reply to
//!   a handler on a fiber of the caller's choice via a private
//!   single-subscriber channel.
//!
//! ## Reply rules
//! - First reply wins on the blocking path; later replies are silent no-ops.
//! - Reply after the handle was disposed or already received: silent no-op.
//! - `receive` past its deadline returns [`ReceiveError::TimedOut`] — an
//!   expected outcome, never a panic.
//! - Disposing a handle **wakes** blocked receivers with
//!   [`ReceiveError::Disposed`]; shutdown must be able to unpark waiters.
//!
//! Do not call `receive` from an async context or from the handler's own
//! fiber: it blocks the thread it runs on. That is its job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::channels::port::{MessageHandler, RequestPort};
use crate::channels::{Channel, Subscription};
use crate::error::ReceiveError;
use crate::fibers::FiberRef;

/// Request/reply over an internal broadcast of request objects.
///
/// Cloning yields another handle to the same channel (requesting and
/// handling sides usually live in different components).
pub struct RequestChannel<Req, Rep> {
    requests: Channel<Request<Req, Rep>>,
}

impl<Req, Rep> Clone for RequestChannel<Req, Rep> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<Req, Rep> Default for RequestChannel<Req, Rep>
where
    Req: Clone + Send + 'static,
    Rep: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Rep> RequestChannel<Req, Rep>
where
    Req: Clone + Send + 'static,
    Rep: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            requests: Channel::new(),
        }
    }

    /// Registers `on_request` on `fiber` for every incoming request.
    ///
    /// The handler owns the [`Request`] and replies through it; requests
    /// sent while no handler is registered are dropped (their `receive`
    /// times out).
    pub fn set_request_handler<F>(&self, fiber: &FiberRef, on_request: F) -> Subscription
    where
        F: Fn(Request<Req, Rep>) + Send + Sync + 'static,
    {
        self.requests.subscribe(fiber, on_request)
    }

    /// Publishes a request and returns the blocking receive handle.
    pub fn send_request(&self, request: Req) -> PendingReply<Rep> {
        let state = Arc::new(ReplyMonitor::new());
        self.requests.publish(Request {
            payload: request,
            sink: ReplySink::Monitor(Arc::clone(&state)),
        });
        PendingReply { state }
    }

    /// Publishes a request whose reply lands in `on_reply` on `fiber`.
    ///
    /// Disposing the returned subscription unbinds the private reply
    /// channel; a reply arriving afterwards is a no-op.
    pub fn send_request_to<F>(&self, request: Req, fiber: &FiberRef, on_reply: F) -> Subscription
    where
        F: Fn(Rep) + Send + Sync + 'static,
    {
        self.send_request_handler(request, fiber, Arc::new(on_reply))
    }

    /// [`send_request_to`](Self::send_request_to) with a pre-built handler.
    pub fn send_request_handler(
        &self,
        request: Req,
        fiber: &FiberRef,
        on_reply: MessageHandler<Rep>,
    ) -> Subscription {
        let replies = Channel::new();
        let subscription = replies.subscribe_handler(fiber, on_reply);
        self.requests.publish(Request {
            payload: request,
            sink: ReplySink::Channel(replies),
        });
        subscription
    }
}

impl<Req, Rep> RequestPort<Req, Rep> for RequestChannel<Req, Rep>
where
    Req: Clone + Send + 'static,
    Rep: Clone + Send + 'static,
{
    fn send_request(&self, request: Req) -> PendingReply<Rep> {
        RequestChannel::send_request(self, request)
    }

    fn send_request_handler(
        &self,
        request: Req,
        fiber: &FiberRef,
        on_reply: MessageHandler<Rep>,
    ) -> Subscription {
        RequestChannel::send_request_handler(self, request, fiber, on_reply)
    }
}

/// One in-flight request, as seen by the registered handler.
pub struct Request<Req, Rep> {
    payload: Req,
    sink: ReplySink<Rep>,
}

impl<Req: Clone, Rep> Clone for Request<Req, Rep> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<Req, Rep> Request<Req, Rep>
where
    Rep: Clone + Send + 'static,
{
    /// The request payload.
    pub fn payload(&self) -> &Req {
        &self.payload
    }

    /// Sends the reply back to the requester.
    ///
    /// On the blocking path only the first reply is observed; on the
    /// callback path each reply is delivered until the requester
    /// unsubscribes. Replying into a consumed or disposed request is a
    /// silent no-op.
    pub fn reply(&self, reply: Rep) {
        match &self.sink {
            ReplySink::Monitor(monitor) => monitor.offer(reply),
            ReplySink::Channel(channel) => channel.publish(reply),
        }
    }
}

enum ReplySink<Rep> {
    Monitor(Arc<ReplyMonitor<Rep>>),
    Channel(Channel<Rep>),
}

impl<Rep> Clone for ReplySink<Rep> {
    fn clone(&self) -> Self {
        match self {
            ReplySink::Monitor(m) => ReplySink::Monitor(Arc::clone(m)),
            ReplySink::Channel(c) => ReplySink::Channel(c.clone()),
        }
    }
}

struct MonitorState<Rep> {
    reply: Option<Rep>,
    consumed: bool,
    disposed: bool,
}

struct ReplyMonitor<Rep> {
    state: Mutex<MonitorState<Rep>>,
    cond: Condvar,
}

impl<Rep> ReplyMonitor<Rep> {
    fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                reply: None,
                consumed: false,
                disposed: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn offer(&self, reply: Rep) {
        let mut state = self.state.lock();
        if state.consumed || state.disposed || state.reply.is_some() {
            return;
        }
        state.reply = Some(reply);
        self.cond.notify_all();
    }
}

/// Blocking receive handle for one request.
pub struct PendingReply<Rep> {
    state: Arc<ReplyMonitor<Rep>>,
}

impl<Rep> PendingReply<Rep> {
    /// Parks the calling thread until a reply arrives, the handle is
    /// disposed, or `timeout` elapses.
    ///
    /// The first successful receive consumes the reply; a second call
    /// returns [`ReceiveError::AlreadyReceived`]. Timeouts large enough to
    /// overflow the clock are treated as "wait forever".
    pub fn receive(&self, timeout: Duration) -> Result<Rep, ReceiveError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.state.lock();
        loop {
            if let Some(reply) = state.reply.take() {
                state.consumed = true;
                return Ok(reply);
            }
            if state.consumed {
                return Err(ReceiveError::AlreadyReceived);
            }
            if state.disposed {
                return Err(ReceiveError::Disposed);
            }
            match deadline {
                Some(deadline) => {
                    if self.state.cond.wait_until(&mut state, deadline).timed_out() {
                        if let Some(reply) = state.reply.take() {
                            state.consumed = true;
                            return Ok(reply);
                        }
                        return Err(ReceiveError::TimedOut { timeout });
                    }
                }
                None => self.state.cond.wait(&mut state),
            }
        }
    }

    /// Non-blocking probe: `Ok` if a reply is already waiting.
    pub fn try_receive(&self) -> Result<Rep, ReceiveError> {
        self.receive(Duration::ZERO)
    }

    /// Abandons the request: wakes any blocked receiver with
    /// [`ReceiveError::Disposed`] and turns future replies into no-ops.
    /// Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        self.state.cond.notify_all();
    }
}
