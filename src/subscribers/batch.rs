//! Full-batch subscriber: same window skeleton as the coalescing variant,
//! but every message of the window survives, delivered as one `Vec` in
//! arrival order.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::channels::{DirectSubscribe, MessageHandler, Subscription};
use crate::fibers::FiberRef;

struct Window<T> {
    pending: Vec<T>,
    flush_scheduled: bool,
}

/// Subscribes `target` to `port`, delivering each interval's accumulated
/// messages as a single batch.
pub(crate) fn attach_batch<T, P>(
    port: &P,
    fiber: &FiberRef,
    interval: Duration,
    target: Arc<dyn Fn(Vec<T>) + Send + Sync>,
) -> Subscription
where
    T: Send + 'static,
    P: DirectSubscribe<T> + ?Sized,
{
    let token = fiber.cancellation().child_token();
    let window = Arc::new(Mutex::new(Window {
        pending: Vec::new(),
        flush_scheduled: false,
    }));

    let handler: MessageHandler<T> = {
        let fiber = FiberRef::clone(fiber);
        let token = token.clone();
        Arc::new(move |message: T| {
            let mut window_state = window.lock();
            window_state.pending.push(message);
            if !window_state.flush_scheduled {
                window_state.flush_scheduled = true;
                let window = Arc::clone(&window);
                let target = Arc::clone(&target);
                let token = token.clone();
                fiber.schedule(
                    interval,
                    Box::new(move || {
                        let batch = {
                            let mut window_state = window.lock();
                            window_state.flush_scheduled = false;
                            std::mem::take(&mut window_state.pending)
                        };
                        if token.is_cancelled() || batch.is_empty() {
                            return;
                        }
                        target(batch);
                    }),
                );
            }
        })
    };

    port.subscribe_direct(token.clone(), handler);
    Subscription::from_token(token)
}
