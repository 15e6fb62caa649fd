// src/group/mod.rs

//! Callback groups: the mutual-exclusion domains that gate dispatch.
//!
//! - [`CallbackGroup`] is an immutable id + kind, shared as `Arc`.
//! - [`running_set`] tracks which groups are currently occupied by an
//!   in-flight callback, and optionally reports enter/exit events.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::CallbackGroupKind;

pub mod running_set;

pub use running_set::{GroupEvent, GroupObserver, RunningSet};

/// Process-unique identifier of a callback group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GroupId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// A mutual-exclusion domain tag attached to callbacks.
///
/// Callbacks reference a group; the group owns nothing. Two groups are equal
/// only if they are the same group, regardless of kind.
#[derive(Debug)]
pub struct CallbackGroup {
    id: GroupId,
    kind: CallbackGroupKind,
}

impl CallbackGroup {
    pub fn new(kind: CallbackGroupKind) -> Arc<Self> {
        Arc::new(Self {
            id: GroupId::next(),
            kind,
        })
    }

    pub fn exclusive() -> Arc<Self> {
        Self::new(CallbackGroupKind::Exclusive)
    }

    pub fn reentrant() -> Arc<Self> {
        Self::new(CallbackGroupKind::Reentrant)
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn kind(&self) -> CallbackGroupKind {
        self.kind
    }

    pub fn is_exclusive(&self) -> bool {
        self.kind == CallbackGroupKind::Exclusive
    }
}

impl PartialEq for CallbackGroup {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CallbackGroup {}

impl Hash for CallbackGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_compare_by_identity() {
        let a = CallbackGroup::exclusive();
        let b = CallbackGroup::exclusive();
        assert_ne!(*a, *b);
        assert_eq!(*a, *Arc::clone(&a));
        assert_eq!(a.kind(), b.kind());
    }

    #[test]
    fn kind_is_reported() {
        assert!(CallbackGroup::exclusive().is_exclusive());
        assert!(!CallbackGroup::reentrant().is_exclusive());
    }
}
