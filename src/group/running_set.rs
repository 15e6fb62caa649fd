// src/group/running_set.rs

//! Occupancy bookkeeping for callback groups.
//!
//! The running set is only ever touched while the executor state lock is
//! held, so a check in [`RunningSet::can_enter`] followed by
//! [`RunningSet::enter`] is atomic with respect to other workers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{CallbackGroup, GroupId};
use crate::types::CallbackGroupKind;

/// Enter/exit notification for instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    Enter {
        group: GroupId,
        kind: CallbackGroupKind,
        occupancy: usize,
    },
    Exit {
        group: GroupId,
        kind: CallbackGroupKind,
        occupancy: usize,
    },
}

/// Receives [`GroupEvent`]s from an executor.
///
/// Called with the executor lock held; implementations must not call back
/// into the executor.
pub trait GroupObserver: Send + Sync {
    fn on_event(&self, event: GroupEvent);
}

/// Set of groups currently occupied by in-flight callbacks.
#[derive(Default)]
pub struct RunningSet {
    occupancy: HashMap<GroupId, usize>,
    observer: Option<Arc<dyn GroupObserver>>,
}

impl fmt::Debug for RunningSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningSet")
            .field("occupancy", &self.occupancy)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl RunningSet {
    pub fn new(observer: Option<Arc<dyn GroupObserver>>) -> Self {
        Self {
            occupancy: HashMap::new(),
            observer,
        }
    }

    /// Whether a callback of `group` may start right now.
    pub fn can_enter(&self, group: &CallbackGroup) -> bool {
        match group.kind() {
            CallbackGroupKind::Exclusive => self.occupancy(group.id()) == 0,
            CallbackGroupKind::Reentrant => true,
        }
    }

    /// Number of in-flight callbacks of the given group.
    pub fn occupancy(&self, id: GroupId) -> usize {
        self.occupancy.get(&id).copied().unwrap_or(0)
    }

    /// Whether no group is occupied.
    pub fn is_empty(&self) -> bool {
        self.occupancy.is_empty()
    }

    pub fn enter(&mut self, group: &CallbackGroup) {
        debug_assert!(self.can_enter(group), "exclusive group entered twice");

        let count = self.occupancy.entry(group.id()).or_insert(0);
        *count += 1;
        let occupancy = *count;
        trace!(group = %group.id(), kind = %group.kind(), occupancy, "group entered");

        if let Some(observer) = &self.observer {
            observer.on_event(GroupEvent::Enter {
                group: group.id(),
                kind: group.kind(),
                occupancy,
            });
        }
    }

    pub fn exit(&mut self, group: &CallbackGroup) {
        let occupancy = match self.occupancy.get_mut(&group.id()) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                self.occupancy.remove(&group.id());
                0
            }
            None => {
                debug_assert!(false, "exit for a group that was never entered");
                return;
            }
        };
        trace!(group = %group.id(), kind = %group.kind(), occupancy, "group released");

        if let Some(observer) = &self.observer {
            observer.on_event(GroupEvent::Exit {
                group: group.id(),
                kind: group.kind(),
                occupancy,
            });
        }
    }
}
