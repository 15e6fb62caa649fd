// src/executor/mod.rs

//! Callback execution layer.
//!
//! - [`callback`] defines the unit of work (`ReadyCallback`) and its kind.
//! - [`queue`] holds the FIFO ready queue with group-aware selection.
//! - [`pool`] owns the worker pool executor (`Executor`, `ExecutorHandle`).
//! - [`timer`] contains periodic timers and their feeder threads.

pub mod callback;
pub mod pool;
pub mod queue;
pub mod timer;

pub use callback::{CallbackKind, ReadyCallback};
pub use pool::{Executor, ExecutorHandle, ExecutorOptions, default_thread_count};
pub use queue::ReadyQueue;
pub use timer::Timer;
