// src/node/service.rs

//! Typed request/response contract keyed by service name.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use anyhow::Context;

use super::NodeInner;
use crate::errors::{DemoError, Result};
use crate::executor::{CallbackKind, ReadyCallback};
use crate::group::CallbackGroup;

/// Compile-time description of a service's payload types.
pub trait ServiceType: Send + Sync + 'static {
    /// Name reported in type-mismatch errors.
    const TYPE_NAME: &'static str;
    type Request: Send + 'static;
    type Response: Send + 'static;
}

/// Service with empty request and response payloads.
#[derive(Debug, Clone, Copy)]
pub struct Empty;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResponse;

impl ServiceType for Empty {
    const TYPE_NAME: &'static str = "std_srvs/Empty";
    type Request = EmptyRequest;
    type Response = EmptyResponse;
}

pub(crate) type Handler<S> =
    Arc<dyn Fn(<S as ServiceType>::Request) -> anyhow::Result<<S as ServiceType>::Response> + Send + Sync>;

/// Server side of a service, as stored in the runtime registry.
pub(crate) struct ServiceHandle<S: ServiceType> {
    name: String,
    node: Weak<NodeInner>,
    group: Arc<CallbackGroup>,
    handler: Handler<S>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: ServiceType> ServiceHandle<S> {
    pub(crate) fn new(
        name: String,
        node: Weak<NodeInner>,
        group: Arc<CallbackGroup>,
        handler: Handler<S>,
    ) -> Self {
        Self {
            name,
            node,
            group,
            handler,
            _marker: PhantomData,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Queue the handler on the serving node's executor. `reply` runs on
    /// that executor with the handler's response.
    pub(crate) fn dispatch<R>(&self, request: S::Request, reply: R) -> Result<()>
    where
        R: FnOnce(S::Response) -> Result<()> + Send + 'static,
    {
        let node = self
            .node
            .upgrade()
            .ok_or_else(|| DemoError::ServiceUnavailable(self.name.clone()))?;
        let executor = node.executor()?;

        let handler = Arc::clone(&self.handler);
        let service = self.name.clone();
        executor.enqueue(ReadyCallback::new(
            CallbackKind::ServiceRequest,
            Arc::clone(&self.group),
            self.name.clone(),
            move || {
                let response = handler(request)
                    .with_context(|| format!("handler of service '{service}' failed"))?;
                reply(response)?;
                Ok(())
            },
        ));
        Ok(())
    }
}

/// Type-erased registry entry.
pub(crate) struct ServiceEntry {
    type_name: &'static str,
    handle: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl ServiceEntry {
    pub(crate) fn new<S: ServiceType>(handle: ServiceHandle<S>) -> Self {
        Self {
            type_name: S::TYPE_NAME,
            handle: Arc::new(handle),
        }
    }

    pub(crate) fn downcast<S: ServiceType>(&self, name: &str) -> Result<Arc<ServiceHandle<S>>> {
        Arc::clone(&self.handle)
            .downcast::<ServiceHandle<S>>()
            .map_err(|_| DemoError::ServiceTypeMismatch {
                service: name.to_string(),
                expected: S::TYPE_NAME,
                actual: self.type_name,
            })
    }
}
