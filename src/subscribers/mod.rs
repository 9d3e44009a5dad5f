//! # Rate-bounded subscribers.
//!
//! Both variants share one skeleton: the channel invokes a small handler in
//! *publisher context* that stashes the message under a private lock and,
//! if no flush is pending for the current window, plants a one-shot timer
//! on the target fiber. The flush (running on that fiber) takes-and-clears
//! the stash and calls the downstream handler.
//!
//! - [`attach_last`] keeps only the newest message: ≤ 1 delivery per
//!   interval, intermediate values are overwritten and never delivered.
//! - [`attach_batch`] appends: the whole window's messages arrive as one
//!   `Vec`, in arrival order.
//!
//! The lock is required because stores happen on publisher threads while
//! the flush runs on the target fiber.

mod batch;
mod last;

pub(crate) use batch::attach_batch;
pub(crate) use last::attach_last;
