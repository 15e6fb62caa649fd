// src/executor/pool.rs

//! Worker pool executor.
//!
//! A fixed number of OS threads share one [`ReadyQueue`]. A worker takes the
//! oldest ready callback whose group the [`RunningSet`] admits, marks the
//! group occupied, runs the callback with the lock released, and then frees
//! the group again. Blocking inside a callback really parks the worker: the
//! thread and the group it occupies stay unavailable until it returns.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use super::callback::ReadyCallback;
use super::queue::ReadyQueue;
use super::timer::{Timer, run_timer};
use crate::errors::{DemoError, Result};
use crate::group::{CallbackGroup, GroupObserver, RunningSet};
use crate::node::{Node, NodeInner, Runtime};

/// Lifecycle of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Spinning,
    ShutDown,
}

/// Options for constructing an [`Executor`].
#[derive(Clone)]
pub struct ExecutorOptions {
    /// Used for thread names and log fields.
    pub name: String,
    /// Size of the worker pool; clamped to at least 1.
    pub num_threads: usize,
    /// Receives group enter/exit events, for instrumentation.
    pub observer: Option<Arc<dyn GroupObserver>>,
}

impl fmt::Debug for ExecutorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorOptions")
            .field("name", &self.name)
            .field("num_threads", &self.num_threads)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            name: "executor".to_string(),
            num_threads: default_thread_count(),
            observer: None,
        }
    }
}

/// Available parallelism, but never fewer than two workers.
pub fn default_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

/// Mutable executor state, guarded by one lock.
pub(crate) struct ExecutorState {
    pub(crate) phase: Phase,
    pub(crate) queue: ReadyQueue,
    pub(crate) running: RunningSet,
    nodes: Vec<Arc<NodeInner>>,
}

/// State shared between the executor, its threads and bound nodes.
pub(crate) struct ExecutorShared {
    pub(crate) name: String,
    num_threads: usize,
    pub(crate) state: Mutex<ExecutorState>,
    /// Signalled on enqueue, on group release and on shutdown.
    pub(crate) wakeup: Condvar,
    dispatched: AtomicU64,
}

impl ExecutorShared {
    fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.phase == Phase::ShutDown {
            debug!(executor = %self.name, "shutdown requested again; ignoring");
            return;
        }

        state.phase = Phase::ShutDown;
        let dropped = state.queue.clear();
        // Nodes hold timers whose closures may own clients; release them here.
        state.nodes.clear();
        self.wakeup.notify_all();

        info!(executor = %self.name, dropped, "executor shutting down");
    }

    /// Block until some worker could run a callback, then claim it.
    ///
    /// Returns `None` once the executor is shut down.
    fn next_ready(&self) -> Option<ReadyCallback> {
        let mut state = self.state.lock();

        loop {
            if state.phase == Phase::ShutDown {
                return None;
            }

            let ExecutorState { queue, running, .. } = &mut *state;
            if let Some(callback) = queue.take_next(|group| running.can_enter(group)) {
                running.enter(&callback.group);
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                return Some(callback);
            }

            self.wakeup.wait(&mut state);
        }
    }
}

/// Releases a group when dropped, whatever way the callback ended.
struct Occupancy<'a> {
    shared: &'a ExecutorShared,
    group: Arc<CallbackGroup>,
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.running.exit(&self.group);
        self.shared.wakeup.notify_all();
    }
}

/// Cloneable handle used to enqueue work and to request shutdown from any
/// thread.
#[derive(Clone)]
pub struct ExecutorHandle {
    shared: Arc<ExecutorShared>,
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl ExecutorHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue a ready callback. Dropped (with a debug log) after shutdown.
    pub fn enqueue(&self, callback: ReadyCallback) {
        let mut state = self.shared.state.lock();
        if state.phase == Phase::ShutDown {
            debug!(
                executor = %self.shared.name,
                kind = %callback.kind,
                label = %callback.label,
                "executor shut down; dropping callback"
            );
            return;
        }
        state.queue.push(callback);
        self.shared.wakeup.notify_all();
    }

    /// Stop dispatching and wake every thread. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().phase == Phase::ShutDown
    }

    pub(crate) fn downgrade(&self) -> Weak<ExecutorShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<ExecutorShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn same_as(&self, weak: &Weak<ExecutorShared>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.shared), weak.as_ptr())
    }
}

/// Fixed-size worker pool that runs callbacks of the nodes added to it.
#[derive(Debug)]
pub struct Executor {
    handle: ExecutorHandle,
}

impl Executor {
    /// Create an executor tied to `runtime`; stopping the runtime shuts it
    /// down.
    pub fn new(runtime: &Runtime, options: ExecutorOptions) -> Self {
        let num_threads = options.num_threads.max(1);
        let shared = Arc::new(ExecutorShared {
            name: options.name,
            num_threads,
            state: Mutex::new(ExecutorState {
                phase: Phase::Idle,
                queue: ReadyQueue::new(),
                running: RunningSet::new(options.observer),
                nodes: Vec::new(),
            }),
            wakeup: Condvar::new(),
            dispatched: AtomicU64::new(0),
        });

        let handle = ExecutorHandle { shared };
        runtime.register_executor(&handle);
        Self { handle }
    }

    pub fn single_threaded(runtime: &Runtime, name: impl Into<String>) -> Self {
        Self::new(
            runtime,
            ExecutorOptions {
                name: name.into(),
                num_threads: 1,
                observer: None,
            },
        )
    }

    pub fn multi_threaded(runtime: &Runtime, name: impl Into<String>, num_threads: usize) -> Self {
        Self::new(
            runtime,
            ExecutorOptions {
                name: name.into(),
                num_threads,
                observer: None,
            },
        )
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn num_threads(&self) -> usize {
        self.handle.shared.num_threads
    }

    /// Bind a node (its timers, clients and services) to this executor.
    ///
    /// Adding the same node twice is a no-op.
    pub fn add_node(&self, node: &Node) -> Result<()> {
        let inner = node.inner();
        {
            let mut binding = inner.executor.lock();
            if let Some(existing) = binding.as_ref() {
                if self.handle.same_as(existing) {
                    return Ok(());
                }
                if let Some(other) = ExecutorHandle::upgrade(existing) {
                    return Err(DemoError::NodeAlreadyBound {
                        node: inner.name.clone(),
                        executor: other.name().to_string(),
                    });
                }
            }
            *binding = Some(self.handle.downgrade());
        }

        let mut state = self.handle.shared.state.lock();
        state.nodes.push(Arc::clone(inner));
        debug!(executor = %self.name(), node = %inner.name, "node added to executor");
        Ok(())
    }

    /// Number of callbacks handed to a worker so far.
    pub fn dispatch_count(&self) -> u64 {
        self.handle.shared.dispatched.load(Ordering::Relaxed)
    }

    /// Number of callbacks waiting in the ready queue.
    pub fn pending_len(&self) -> usize {
        self.handle.shared.state.lock().queue.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.handle.is_shut_down()
    }

    /// Stop dispatching after in-flight callbacks return. Idempotent.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Run the worker pool and timers until [`Executor::shutdown`] (or
    /// runtime stop), then join every thread.
    pub fn spin(&self) -> Result<()> {
        let shared = &self.handle.shared;

        let timers: Vec<Arc<Timer>> = {
            let mut state = shared.state.lock();
            if state.phase != Phase::Idle {
                return Err(DemoError::AlreadySpinning(shared.name.clone()));
            }
            state.phase = Phase::Spinning;
            state.nodes.iter().flat_map(|node| node.timers()).collect()
        };

        info!(
            executor = %shared.name,
            workers = shared.num_threads,
            timers = timers.len(),
            "executor spinning"
        );

        let threads = match self.spawn_threads(timers) {
            Ok(threads) => threads,
            Err(err) => {
                error!(executor = %shared.name, error = %err, "failed to start executor threads");
                shared.shutdown();
                return Err(err);
            }
        };

        {
            let mut state = shared.state.lock();
            while state.phase != Phase::ShutDown {
                shared.wakeup.wait(&mut state);
            }
        }

        join_all(&shared.name, threads);
        info!(executor = %shared.name, "executor stopped");
        Ok(())
    }

    fn spawn_threads(&self, timers: Vec<Arc<Timer>>) -> Result<Vec<JoinHandle<()>>> {
        let shared = &self.handle.shared;
        let mut threads = Vec::with_capacity(shared.num_threads + timers.len());

        for index in 0..shared.num_threads {
            let worker_shared = Arc::clone(shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", shared.name, index))
                .spawn(move || run_worker(worker_shared, index));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    shared.shutdown();
                    join_all(&shared.name, threads);
                    return Err(err.into());
                }
            }
        }

        for timer in timers {
            let timer_shared = Arc::clone(shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-timer-{}", shared.name, timer.name()))
                .spawn(move || run_timer(timer_shared, timer));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    shared.shutdown();
                    join_all(&shared.name, threads);
                    return Err(err.into());
                }
            }
        }

        Ok(threads)
    }
}

fn join_all(executor: &str, threads: Vec<JoinHandle<()>>) {
    for handle in threads {
        if handle.join().is_err() {
            warn!(executor = %executor, "executor thread panicked");
        }
    }
}

/// Worker thread body.
fn run_worker(shared: Arc<ExecutorShared>, index: usize) {
    debug!(executor = %shared.name, worker = index, "worker started");

    while let Some(callback) = shared.next_ready() {
        let _occupancy = Occupancy {
            shared: &shared,
            group: Arc::clone(&callback.group),
        };

        let kind = callback.kind;
        let label = callback.label.clone();
        debug!(executor = %shared.name, worker = index, %kind, label = %label, "running callback");

        match catch_unwind(AssertUnwindSafe(|| callback.run())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    executor = %shared.name,
                    %kind,
                    label = %label,
                    error = %err,
                    "callback failed"
                );
            }
            Err(_) => {
                error!(
                    executor = %shared.name,
                    %kind,
                    label = %label,
                    "callback panicked; group released, executor continues"
                );
            }
        }
    }

    debug!(executor = %shared.name, worker = index, "worker finished");
}
