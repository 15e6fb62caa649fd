// src/node/mod.rs

//! Nodes and the entities they own.
//!
//! A node groups timers, clients and services under one name and one
//! *default callback group*. The default group is a single exclusive group
//! shared by every entity of the node that was created without an explicit
//! group, so e.g. an unscoped timer and an unscoped client of the same node
//! can never run at the same time.
//!
//! - [`runtime`] holds the explicit start/stop context.
//! - [`service`] defines the typed service contract and server side.
//! - [`client`] implements the blocking client call.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{DemoError, Result};
use crate::executor::pool::ExecutorShared;
use crate::executor::{ExecutorHandle, Timer};
use crate::group::CallbackGroup;

pub mod client;
pub mod runtime;
pub mod service;

pub use client::Client;
pub use runtime::{Runtime, RuntimeOptions};
pub use service::{Empty, EmptyRequest, EmptyResponse, ServiceType};

/// State behind a [`Node`] handle.
pub(crate) struct NodeInner {
    pub(crate) name: String,
    runtime: Runtime,
    default_group: Arc<CallbackGroup>,
    /// Set by `Executor::add_node`; weak so executors and nodes don't keep
    /// each other alive.
    pub(crate) executor: Mutex<Option<Weak<ExecutorShared>>>,
    timers: Mutex<Vec<Arc<Timer>>>,
    services: Mutex<Vec<String>>,
}

impl NodeInner {
    /// Executor this node was added to.
    pub(crate) fn executor(&self) -> Result<ExecutorHandle> {
        self.executor
            .lock()
            .as_ref()
            .and_then(ExecutorHandle::upgrade)
            .ok_or_else(|| DemoError::NodeNotBound(self.name.clone()))
    }

    pub(crate) fn timers(&self) -> Vec<Arc<Timer>> {
        self.timers.lock().clone()
    }
}

/// Named owner of timers, clients and services.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.inner.name)
            .field("default_group", &self.inner.default_group.id())
            .field("timers", &self.inner.timers.lock().len())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(name: String, runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                name,
                runtime,
                default_group: CallbackGroup::exclusive(),
                executor: Mutex::new(None),
                timers: Mutex::new(Vec::new()),
                services: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<NodeInner> {
        &self.inner
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Exclusive group used by entities created without one.
    pub fn default_group(&self) -> &Arc<CallbackGroup> {
        &self.inner.default_group
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    fn group_or_default(&self, group: Option<Arc<CallbackGroup>>) -> Arc<CallbackGroup> {
        group.unwrap_or_else(|| Arc::clone(&self.inner.default_group))
    }

    /// Create a periodic timer.
    ///
    /// Timers start firing when the executor the node was added to starts
    /// spinning; timers created after that never fire.
    pub fn create_timer<F>(
        &self,
        period: Duration,
        group: Option<Arc<CallbackGroup>>,
        callback: F,
    ) -> Arc<Timer>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut timers = self.inner.timers.lock();
        let name = format!("{}/timer{}", self.inner.name, timers.len());
        let timer = Timer::new(name, period, self.group_or_default(group), Arc::new(callback));
        debug!(node = %self.inner.name, timer = %timer.name(), period = ?period, group = %timer.group().id(), "timer created");
        timers.push(Arc::clone(&timer));
        timer
    }

    /// Create a client for the service registered under `service`.
    pub fn create_client<S: ServiceType>(
        &self,
        service: impl Into<String>,
        group: Option<Arc<CallbackGroup>>,
    ) -> Client<S> {
        let client = Client::new(
            service.into(),
            &self.inner,
            self.group_or_default(group),
            self.inner.runtime.clone(),
        );
        debug!(node = %self.inner.name, service = %client.service_name(), group = %client.group().id(), "client created");
        client
    }

    /// Register a service handler under `service`.
    pub fn create_service<S, F>(
        &self,
        service: impl Into<String>,
        group: Option<Arc<CallbackGroup>>,
        handler: F,
    ) -> Result<()>
    where
        S: ServiceType,
        F: Fn(S::Request) -> anyhow::Result<S::Response> + Send + Sync + 'static,
    {
        let name = service.into();
        let handle = service::ServiceHandle::<S>::new(
            name.clone(),
            Arc::downgrade(&self.inner),
            self.group_or_default(group),
            Arc::new(handler),
        );
        self.inner.runtime.register_service(handle)?;
        self.inner.services.lock().push(name);
        Ok(())
    }

    /// Drop the node's timers and unregister its services.
    pub fn destroy(&self) {
        let timers = std::mem::take(&mut *self.inner.timers.lock());
        let services = std::mem::take(&mut *self.inner.services.lock());
        for service in &services {
            self.inner.runtime.unregister_service(service);
        }
        debug!(
            node = %self.inner.name,
            timers = timers.len(),
            services = services.len(),
            "node destroyed"
        );
    }
}
