// src/executor/callback.rs

//! Units of work handed to an executor.

use std::fmt;
use std::sync::Arc;

use crate::group::CallbackGroup;

/// Which kind of entity produced a ready callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// A service handler processing an incoming request.
    ServiceRequest,
    /// A periodic timer firing.
    TimerTick,
    /// A client delivering a response to the thread blocked on it.
    ClientResponse,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::ServiceRequest => f.write_str("service_request"),
            CallbackKind::TimerTick => f.write_str("timer_tick"),
            CallbackKind::ClientResponse => f.write_str("client_response"),
        }
    }
}

type Work = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// A callback that is ready to run as soon as its group admits it.
pub struct ReadyCallback {
    pub kind: CallbackKind,
    pub group: Arc<CallbackGroup>,
    /// Entity name, used for logging only.
    pub label: String,
    work: Work,
}

impl fmt::Debug for ReadyCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyCallback")
            .field("kind", &self.kind)
            .field("group", &self.group.id())
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl ReadyCallback {
    pub fn new<F>(
        kind: CallbackKind,
        group: Arc<CallbackGroup>,
        label: impl Into<String>,
        work: F,
    ) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            kind,
            group,
            label: label.into(),
            work: Box::new(work),
        }
    }

    /// Consume the callback and run its work on the current thread.
    pub fn run(self) -> anyhow::Result<()> {
        (self.work)()
    }
}
