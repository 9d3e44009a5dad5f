//! # Fiber-owned observable collections.
//!
//! [`FiberCollection`] and [`FiberKeyedCollection`] demonstrate (and
//! package) the crate's ownership rule: the backing list/map is mutated
//! only by actions on a private fiber, mutation enters through channels,
//! observation leaves as a snapshot plus deltas, and queries travel the
//! request port. There is no public setter to race on.

mod collection;
mod item_action;
mod keyed;

pub use collection::FiberCollection;
pub use item_action::{ItemAction, ItemActionKind};
pub use keyed::FiberKeyedCollection;

use std::sync::Arc;

/// Query predicate carried through the collections' request port.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;
