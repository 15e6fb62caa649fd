// src/node/client.rs

//! Blocking service client.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::debug;

use super::service::ServiceType;
use super::{NodeInner, Runtime};
use crate::errors::{DemoError, Result};
use crate::executor::{CallbackKind, ReadyCallback};
use crate::group::CallbackGroup;

/// Outstanding calls of one client, keyed by request id.
type PendingTable<T> = Arc<Mutex<HashMap<u64, Sender<T>>>>;

/// Client for a named service.
///
/// Responses are delivered by a `ClientResponse` callback in the client's
/// group on the client node's executor. [`Client::call`] parks the calling
/// thread until that callback has run, so a caller that occupies the same
/// exclusive group can never be answered.
pub struct Client<S: ServiceType> {
    service: String,
    node: Weak<NodeInner>,
    node_name: String,
    group: Arc<CallbackGroup>,
    runtime: Runtime,
    pending: PendingTable<S::Response>,
    next_id: AtomicU64,
}

impl<S: ServiceType> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("service", &self.service)
            .field("node", &self.node_name)
            .field("group", &self.group.id())
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl<S: ServiceType> Client<S> {
    pub(crate) fn new(
        service: String,
        node: &Arc<NodeInner>,
        group: Arc<CallbackGroup>,
        runtime: Runtime,
    ) -> Self {
        Self {
            service,
            node: Arc::downgrade(node),
            node_name: node.name.clone(),
            group,
            runtime,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn group(&self) -> &Arc<CallbackGroup> {
        &self.group
    }

    /// Number of calls currently waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Call the service and block until the response arrives, bounded by
    /// the runtime's `call_timeout`.
    pub fn call(&self, request: S::Request) -> Result<S::Response> {
        self.call_timeout(request, self.runtime.options().call_timeout)
    }

    /// Call the service and block for at most `bound`.
    ///
    /// Fails with [`DemoError::Timeout`] when no response arrives in time and
    /// with [`DemoError::Shutdown`] when the runtime stops first. Never
    /// retries.
    pub fn call_timeout(&self, request: S::Request, bound: Duration) -> Result<S::Response> {
        let node = self
            .node
            .upgrade()
            .ok_or_else(|| DemoError::NodeNotBound(self.node_name.clone()))?;
        let executor = node.executor()?;
        let service = self.runtime.lookup_service::<S>(&self.service)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(1);
        self.pending.lock().insert(id, tx);

        let pending = Arc::clone(&self.pending);
        let group = Arc::clone(&self.group);
        let label = self.service.clone();
        let reply = move |response: S::Response| -> Result<()> {
            executor.enqueue(ReadyCallback::new(
                CallbackKind::ClientResponse,
                group,
                label,
                move || {
                    match pending.lock().remove(&id) {
                        // The caller may give up between removal and send.
                        Some(waiter) => {
                            let _ = waiter.send(response);
                        }
                        None => debug!(request = id, "response for abandoned request dropped"),
                    }
                    Ok(())
                },
            ));
            Ok(())
        };

        if let Err(err) = service.dispatch(request, reply) {
            self.pending.lock().remove(&id);
            return Err(err);
        }
        debug!(node = %self.node_name, service = %self.service, request = id, "request dispatched; waiting");

        let stop = self.runtime.stop_signal();
        let outcome = channel::select! {
            recv(rx) -> msg => msg.map_err(|_| DemoError::Shutdown),
            recv(stop) -> _ => Err(DemoError::Shutdown),
            default(bound) => Err(DemoError::Timeout(bound)),
        };

        if outcome.is_err() {
            self.pending.lock().remove(&id);
            debug!(node = %self.node_name, service = %self.service, request = id, "call abandoned");
        }
        outcome
    }
}
