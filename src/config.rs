//! # Fiber construction settings.
//!
//! [`FiberConfig`] carries everything a factory needs to build one fiber:
//! the execution strategy ([`FiberKind`]) plus per-strategy knobs.
//!
//! Config is used in two ways:
//! 1. **Factory calls**: `spawn_fiber(&FiberConfig::thread())`
//! 2. **Tag-driven wiring**: `FiberKind::from_str("pool")` when the strategy
//!    comes from external configuration; an unrecognized tag is a
//!    construction-time [`ConfigError::UnknownKind`], never a runtime fault.

use std::str::FromStr;

use crate::error::ConfigError;

/// Execution strategy for a fiber.
///
/// All three share one contract (serialized, in-order action execution);
/// they differ in which thread runs the actions and at what cost:
///
/// | Kind     | Runs on                     | Cost / character                          |
/// |----------|-----------------------------|-------------------------------------------|
/// | `Thread` | a private worker thread     | one OS thread per fiber, steady latency    |
/// | `Pool`   | the shared tokio pool       | no dedicated thread, batched hand-off      |
/// | `Stub`   | the calling thread, inline  | zero hand-off; single-producer tests only  |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiberKind {
    /// Dedicated worker thread, blocking wait when the queue is empty.
    Thread,
    /// Batches flushed onto the shared worker pool.
    Pool,
    /// Inline synchronous execution on the enqueueing thread.
    Stub,
}

impl FiberKind {
    /// Stable lowercase tag, inverse of [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            FiberKind::Thread => "thread",
            FiberKind::Pool => "pool",
            FiberKind::Stub => "stub",
        }
    }
}

impl FromStr for FiberKind {
    type Err = ConfigError;

    /// Parses a strategy tag (case-insensitive).
    ///
    /// # Example
    /// ```
    /// use fibra::FiberKind;
    ///
    /// assert_eq!("pool".parse::<FiberKind>().unwrap(), FiberKind::Pool);
    /// assert!("quantum".parse::<FiberKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thread" => Ok(FiberKind::Thread),
            "pool" => Ok(FiberKind::Pool),
            "stub" => Ok(FiberKind::Stub),
            _ => Err(ConfigError::UnknownKind { kind: s.to_string() }),
        }
    }
}

/// Per-fiber construction settings.
///
/// ## Field semantics
/// - `kind`: execution strategy (see [`FiberKind`]).
/// - `initial_capacity`: starting capacity of the pooled fiber's pending
///   list (both buffers of the double-buffer swap). Ignored by the other
///   strategies.
/// - `thread_name`: name for the dedicated worker thread; `None` picks
///   `fibra-thread-N`. Ignored by the other strategies.
#[derive(Clone, Debug)]
pub struct FiberConfig {
    /// Execution strategy.
    pub kind: FiberKind,
    /// Initial pending-list capacity for pooled fibers.
    pub initial_capacity: usize,
    /// Worker thread name for dedicated-thread fibers.
    pub thread_name: Option<String>,
}

impl FiberConfig {
    /// Config for the given strategy with default knobs.
    pub fn of(kind: FiberKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Dedicated-thread config.
    pub fn thread() -> Self {
        Self::of(FiberKind::Thread)
    }

    /// Pooled-batch config.
    pub fn pool() -> Self {
        Self::of(FiberKind::Pool)
    }

    /// Inline/stub config.
    pub fn stub() -> Self {
        Self::of(FiberKind::Stub)
    }

    /// Sets the dedicated worker thread name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }
}

impl Default for FiberConfig {
    /// Defaults to the pooled strategy with a 1024-action initial buffer.
    fn default() -> Self {
        Self {
            kind: FiberKind::Pool,
            initial_capacity: 1024,
            thread_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for kind in [FiberKind::Thread, FiberKind::Pool, FiberKind::Stub] {
            assert_eq!(kind.as_str().parse::<FiberKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_config_error() {
        let err = "warp".parse::<FiberKind>().unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_kind");
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        assert_eq!("Thread".parse::<FiberKind>().unwrap(), FiberKind::Thread);
        assert_eq!("POOL".parse::<FiberKind>().unwrap(), FiberKind::Pool);
    }
}
