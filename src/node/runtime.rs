// src/node/runtime.rs

//! Explicit process-wide context: start/stop, service registry, executors.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::Node;
use super::service::{ServiceEntry, ServiceHandle, ServiceType};
use crate::errors::{DemoError, Result};
use crate::executor::ExecutorHandle;
use crate::executor::pool::ExecutorShared;

/// Options shared by everything created against one runtime.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Bound for [`Client::call`](super::Client::call).
    pub call_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimePhase {
    Created,
    Running,
    Stopped,
}

struct RuntimeInner {
    options: RuntimeOptions,
    phase: Mutex<RuntimePhase>,
    /// Dropped on stop, which disconnects every clone of `stop_rx`.
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    services: Mutex<HashMap<String, ServiceEntry>>,
    executors: Mutex<Vec<Weak<ExecutorShared>>>,
}

/// Runtime context, constructed once per scenario and torn down with
/// [`Runtime::stop`].
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.inner.options)
            .field("phase", &*self.inner.phase.lock())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        let (stop_tx, stop_rx) = channel::bounded(0);
        Self {
            inner: Arc::new(RuntimeInner {
                options,
                phase: Mutex::new(RuntimePhase::Created),
                stop_tx: Mutex::new(Some(stop_tx)),
                stop_rx,
                services: Mutex::new(HashMap::new()),
                executors: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn options(&self) -> RuntimeOptions {
        self.inner.options
    }

    /// Start the runtime. Starting a running runtime is a no-op; a stopped
    /// runtime cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut phase = self.inner.phase.lock();
        match *phase {
            RuntimePhase::Created => {
                *phase = RuntimePhase::Running;
                debug!("runtime started");
                Ok(())
            }
            RuntimePhase::Running => Ok(()),
            RuntimePhase::Stopped => Err(DemoError::NotStarted),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.inner.phase.lock() == RuntimePhase::Running
    }

    /// Stop the runtime: wake every blocked client call with
    /// [`DemoError::Shutdown`], shut down all executors created against it,
    /// and drop the service registry. Idempotent.
    pub fn stop(&self) {
        {
            let mut phase = self.inner.phase.lock();
            if *phase == RuntimePhase::Stopped {
                return;
            }
            *phase = RuntimePhase::Stopped;
        }

        self.inner.stop_tx.lock().take();

        let executors: Vec<ExecutorHandle> = self
            .inner
            .executors
            .lock()
            .drain(..)
            .filter_map(|weak| ExecutorHandle::upgrade(&weak))
            .collect();
        for executor in &executors {
            executor.shutdown();
        }

        let services = {
            let mut registry = self.inner.services.lock();
            let count = registry.len();
            registry.clear();
            count
        };

        info!(executors = executors.len(), services, "runtime stopped");
    }

    /// Create a node. The runtime must be running.
    pub fn create_node(&self, name: impl Into<String>) -> Result<Node> {
        if !self.is_running() {
            return Err(DemoError::NotStarted);
        }
        Ok(Node::new(name.into(), self.clone()))
    }

    /// Receiver that disconnects when the runtime stops.
    pub(crate) fn stop_signal(&self) -> Receiver<()> {
        self.inner.stop_rx.clone()
    }

    pub(crate) fn register_executor(&self, executor: &ExecutorHandle) {
        let mut executors = self.inner.executors.lock();
        executors.retain(|weak| weak.strong_count() > 0);
        executors.push(executor.downgrade());
    }

    pub(crate) fn register_service<S: ServiceType>(&self, handle: ServiceHandle<S>) -> Result<()> {
        if !self.is_running() {
            return Err(DemoError::NotStarted);
        }

        let mut services = self.inner.services.lock();
        let name = handle.name().to_string();
        if services.contains_key(&name) {
            return Err(DemoError::DuplicateService(name));
        }
        debug!(service = %name, kind = S::TYPE_NAME, "service registered");
        services.insert(name, ServiceEntry::new(handle));
        Ok(())
    }

    pub(crate) fn unregister_service(&self, name: &str) {
        self.inner.services.lock().remove(name);
    }

    pub(crate) fn lookup_service<S: ServiceType>(&self, name: &str) -> Result<Arc<ServiceHandle<S>>> {
        let services = self.inner.services.lock();
        let entry = services
            .get(name)
            .ok_or_else(|| DemoError::ServiceUnavailable(name.to_string()))?;
        entry.downcast::<S>(name)
    }
}
