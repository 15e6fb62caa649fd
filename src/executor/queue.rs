// src/executor/queue.rs

use std::collections::VecDeque;

use tracing::debug;

use super::callback::ReadyCallback;
use crate::group::CallbackGroup;

/// FIFO queue of ready callbacks shared by all workers of one executor.
///
/// Semantics:
/// - Callbacks are kept in arrival order.
/// - [`ReadyQueue::take_next`] returns the *oldest* callback whose group is
///   admitted by the caller's predicate. Callbacks blocked by group
///   occupancy stay where they are, so within one exclusive group executions
///   happen strictly in arrival order.
/// - Callbacks of other groups may overtake a blocked one; across groups no
///   ordering is promised.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: VecDeque<ReadyCallback>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, callback: ReadyCallback) {
        debug!(
            kind = %callback.kind,
            label = %callback.label,
            group = %callback.group.id(),
            queued = self.entries.len() + 1,
            "callback ready"
        );
        self.entries.push_back(callback);
    }

    /// Remove and return the first callback whose group passes `admits`.
    pub fn take_next<P>(&mut self, mut admits: P) -> Option<ReadyCallback>
    where
        P: FnMut(&CallbackGroup) -> bool,
    {
        let index = self
            .entries
            .iter()
            .position(|callback| admits(&callback.group))?;
        self.entries.remove(index)
    }

    /// Drop every queued callback, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
