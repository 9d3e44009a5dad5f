//! Delta type emitted by the observable collections.

/// What happened to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemActionKind {
    Added,
    Updated,
    Removed,
}

/// One collection change, as delivered to snapshot subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemAction<T> {
    pub kind: ItemActionKind,
    pub item: T,
}

impl<T> ItemAction<T> {
    pub(crate) fn added(item: T) -> Self {
        Self {
            kind: ItemActionKind::Added,
            item,
        }
    }

    pub(crate) fn updated(item: T) -> Self {
        Self {
            kind: ItemActionKind::Updated,
            item,
        }
    }

    pub(crate) fn removed(item: T) -> Self {
        Self {
            kind: ItemActionKind::Removed,
            item,
        }
    }
}
