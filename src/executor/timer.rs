// src/executor/timer.rs

//! Periodic timers and the per-timer thread that feeds an executor.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::callback::{CallbackKind, ReadyCallback};
use super::pool::{ExecutorShared, Phase};
use crate::group::CallbackGroup;

pub(crate) type TimerCallback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A periodic trigger owned by a node.
///
/// At most one tick per timer waits in the ready queue; a period that
/// elapses while a tick is still queued is skipped.
pub struct Timer {
    name: String,
    period: Duration,
    group: Arc<CallbackGroup>,
    callback: TimerCallback,
    /// Set while a tick is queued but not yet started.
    armed: AtomicBool,
    fired: AtomicU64,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("group", &self.group.id())
            .finish_non_exhaustive()
    }
}

impl Timer {
    pub(crate) fn new(
        name: String,
        period: Duration,
        group: Arc<CallbackGroup>,
        callback: TimerCallback,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            period,
            group,
            callback,
            armed: AtomicBool::new(false),
            fired: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn group(&self) -> &Arc<CallbackGroup> {
        &self.group
    }

    /// Number of ticks that actually started running.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Build the next tick, or `None` if one is still waiting in the queue.
    fn tick(self: &Arc<Self>) -> Option<ReadyCallback> {
        if self.armed.swap(true, Ordering::AcqRel) {
            return None;
        }

        let timer = Arc::clone(self);
        Some(ReadyCallback::new(
            CallbackKind::TimerTick,
            Arc::clone(&self.group),
            self.name.clone(),
            move || {
                timer.armed.store(false, Ordering::Release);
                timer.fired.fetch_add(1, Ordering::Relaxed);
                (timer.callback)()
            },
        ))
    }
}

/// Timer thread body: enqueue a tick every period until shutdown.
///
/// Waits on the executor's condvar so that `shutdown()` interrupts the
/// sleep immediately.
pub(crate) fn run_timer(shared: Arc<ExecutorShared>, timer: Arc<Timer>) {
    debug!(executor = %shared.name, timer = %timer.name, period = ?timer.period, "timer thread started");

    let mut next = Instant::now() + timer.period;
    let mut state = shared.state.lock();

    loop {
        if state.phase == Phase::ShutDown {
            break;
        }

        shared.wakeup.wait_until(&mut state, next);

        if state.phase == Phase::ShutDown {
            break;
        }
        if Instant::now() < next {
            // Woken by unrelated activity.
            continue;
        }
        next += timer.period;

        match timer.tick() {
            Some(tick) => {
                state.queue.push(tick);
                shared.wakeup.notify_all();
            }
            None => {
                trace!(timer = %timer.name, "previous tick still queued; skipping period");
            }
        }
    }

    debug!(executor = %shared.name, timer = %timer.name, "timer thread finished");
}
