//! Error types used by the fibra runtime.
//!
//! This module defines two enums:
//!
//! - [`ConfigError`] — construction-time failures (bad fiber kind, missing
//!   runtime, thread spawn).
//! - [`ReceiveError`] — the expected "no reply" outcomes of a synchronous
//!   request wait. These are ordinary values, not faults: a timed-out
//!   [`receive`](crate::PendingReply::receive) returns `Err(TimedOut)` and
//!   never panics or blocks past its deadline.
//!
//! Both types provide `as_label` for stable snake_case identifiers in logs.

use std::time::Duration;

use thiserror::Error;

/// # Errors raised while constructing runtime components.
///
/// These are configuration mistakes, reported at build time. Once a fiber or
/// scheduler exists, nothing in the crate returns a `ConfigError`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A fiber strategy tag that no factory recognizes.
    #[error("unknown fiber kind {kind:?} (expected \"thread\", \"pool\" or \"stub\")")]
    UnknownKind {
        /// The tag as given.
        kind: String,
    },

    /// Pooled fibers and timers schedule work onto the shared tokio pool;
    /// constructing them outside a runtime cannot work.
    #[error("no tokio runtime in scope; pooled fibers and timers need an ambient runtime")]
    NoRuntime,

    /// The OS refused to spawn a dedicated worker thread.
    #[error("failed to spawn fiber worker thread: {source}")]
    ThreadSpawn {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fibra::ConfigError;
    ///
    /// let err = ConfigError::UnknownKind { kind: "fast".into() };
    /// assert_eq!(err.as_label(), "config_unknown_kind");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnknownKind { .. } => "config_unknown_kind",
            ConfigError::NoRuntime => "config_no_runtime",
            ConfigError::ThreadSpawn { .. } => "config_thread_spawn",
        }
    }
}

/// # Outcomes of a synchronous request wait that carry no reply.
///
/// Returned by [`PendingReply::receive`](crate::PendingReply::receive).
/// `TimedOut` and `Disposed` are expected shutdown/latency outcomes;
/// `AlreadyReceived` flags a second receive on a consumed handle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// No reply arrived before the deadline.
    #[error("no reply within {timeout:?}")]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The request was disposed while (or before) waiting. Disposal wakes
    /// blocked waiters; they observe this instead of waiting out the timeout.
    #[error("request disposed before a reply arrived")]
    Disposed,

    /// A reply was already consumed by an earlier successful receive.
    #[error("reply already received")]
    AlreadyReceived,
}

impl ReceiveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use fibra::ReceiveError;
    ///
    /// let err = ReceiveError::TimedOut { timeout: Duration::from_millis(100) };
    /// assert_eq!(err.as_label(), "receive_timed_out");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReceiveError::TimedOut { .. } => "receive_timed_out",
            ReceiveError::Disposed => "receive_disposed",
            ReceiveError::AlreadyReceived => "receive_already_received",
        }
    }

    /// True for the deadline outcome, false for disposal/double-receive.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReceiveError::TimedOut { .. })
    }
}
