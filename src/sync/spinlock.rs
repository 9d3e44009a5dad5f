//! # Busy-wait mutual exclusion for microsecond-scale critical sections.
//!
//! [`SpinLock`] protects the pooled fiber's push/swap critical sections, where
//! hold times are a handful of instructions and a full blocking mutex would
//! cost more in syscalls than the section itself.
//!
//! ## Rules
//! - **Short sections only**: callers must not run user code, allocate large
//!   buffers, or block while holding the guard.
//! - **No fairness**: acquisition order under contention is unspecified.
//! - The flag lives on its own cache line ([`CachePadded`]) so contended
//!   acquire loops do not false-share with the data they guard.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

/// A test-and-test-and-set spin lock with exponential backoff.
///
/// Acquire loops read the flag with relaxed loads until it looks free, then
/// attempt the CAS; [`Backoff`] escalates from `spin_loop` hints to
/// `yield_now` so a descheduled holder does not burn a full core elsewhere.
pub(crate) struct SpinLock<T> {
    locked: CachePadded<AtomicBool>,
    value: UnsafeCell<T>,
}

// The guard hands out &mut T only while the flag is held, so the usual
// mutex reasoning applies.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            locked: CachePadded::new(AtomicBool::new(false)),
            value: UnsafeCell::new(value),
        }
    }

    /// Spins until the lock is acquired.
    pub(crate) fn lock(&self) -> SpinGuard<'_, T> {
        let backoff = Backoff::new();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinGuard { lock: self };
            }
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }
}

pub(crate) struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
