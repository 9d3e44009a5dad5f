//! Coalescing ("last value wins") subscriber.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::channels::{DirectSubscribe, MessageHandler, Subscription};
use crate::fibers::FiberRef;

struct Window<T> {
    pending: Option<T>,
    flush_scheduled: bool,
}

/// Subscribes `target` to `port` with at most one delivery per `interval`,
/// carrying the latest value published within the window.
pub(crate) fn attach_last<T, P>(
    port: &P,
    fiber: &FiberRef,
    interval: Duration,
    target: MessageHandler<T>,
) -> Subscription
where
    T: Send + 'static,
    P: DirectSubscribe<T> + ?Sized,
{
    let token = fiber.cancellation().child_token();
    let window = Arc::new(Mutex::new(Window {
        pending: None,
        flush_scheduled: false,
    }));

    let handler: MessageHandler<T> = {
        let fiber = FiberRef::clone(fiber);
        let token = token.clone();
        Arc::new(move |message: T| {
            let mut window_state = window.lock();
            window_state.pending = Some(message);
            if !window_state.flush_scheduled {
                window_state.flush_scheduled = true;
                let window = Arc::clone(&window);
                let target = Arc::clone(&target);
                let token = token.clone();
                fiber.schedule(
                    interval,
                    Box::new(move || {
                        let taken = {
                            let mut window_state = window.lock();
                            window_state.flush_scheduled = false;
                            window_state.pending.take()
                        };
                        if token.is_cancelled() {
                            return;
                        }
                        if let Some(latest) = taken {
                            target(latest);
                        }
                    }),
                );
            }
        })
    };

    port.subscribe_direct(token.clone(), handler);
    Subscription::from_token(token)
}
