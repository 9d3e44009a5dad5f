//! Low-level synchronization primitives.
//!
//! Home of [`SpinLock`], the busy-wait lock guarding the pooled fiber's
//! pending-action list. Nothing in here is message-aware; higher layers
//! compose these primitives into fibers and channels.

mod spinlock;

pub(crate) use spinlock::SpinLock;
