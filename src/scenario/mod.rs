// src/scenario/mod.rs

//! Scenario table and driver.
//!
//! A scenario fixes which callback group the client and the timer use and
//! how the call is triggered. The driver builds a fresh runtime, a service
//! node on a single-threaded executor and a demo node on a multi-threaded
//! executor, then waits for the first response or the timeout.
//!
//! - [`driver`] runs scenarios and classifies them.
//! - [`report`] holds per-scenario results and the summary output.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{DemoError, Result};
use crate::executor::default_thread_count;
use crate::group::CallbackGroup;
use crate::types::{CallbackGroupKind, Expectation, TriggerMode};

pub mod driver;
pub mod report;

pub use driver::{run_all, run_scenario};
pub use report::{ScenarioReport, Summary, print_scenario_table};

/// Named callback group inside one scenario.
///
/// Two references with the same name within a scenario resolve to the same
/// group instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub name: String,
    pub kind: CallbackGroupKind,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>, kind: CallbackGroupKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn exclusive(name: impl Into<String>) -> Self {
        Self::new(name, CallbackGroupKind::Exclusive)
    }

    pub fn reentrant(name: impl Into<String>) -> Self {
        Self::new(name, CallbackGroupKind::Reentrant)
    }
}

/// One configuration of groups for the client and the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub name: String,
    pub description: String,
    /// `None` means the demo node's default group.
    pub client_group: Option<GroupSpec>,
    /// `None` means the demo node's default group.
    pub timer_group: Option<GroupSpec>,
    pub trigger: TriggerMode,
    pub expect: Expectation,
}

/// Fresh group instances for one run of a scenario.
#[derive(Debug, Default)]
pub struct ScenarioGroups {
    pub client: Option<Arc<CallbackGroup>>,
    pub timer: Option<Arc<CallbackGroup>>,
}

impl ScenarioSpec {
    /// Create the scenario's groups, sharing instances between equal names.
    pub fn instantiate_groups(&self) -> ScenarioGroups {
        let mut created: HashMap<String, Arc<CallbackGroup>> = HashMap::new();
        let mut resolve = |spec: &Option<GroupSpec>| {
            spec.as_ref().map(|spec| {
                Arc::clone(
                    created
                        .entry(spec.name.clone())
                        .or_insert_with(|| CallbackGroup::new(spec.kind)),
                )
            })
        };

        let client = resolve(&self.client_group);
        let timer = resolve(&self.timer_group);
        ScenarioGroups { client, timer }
    }
}

fn describe(group: &Option<GroupSpec>) -> String {
    match group {
        None => "node default".to_string(),
        Some(group) => format!("{}({})", group.kind, group.name),
    }
}

impl ScenarioSpec {
    pub fn client_group_label(&self) -> String {
        describe(&self.client_group)
    }

    pub fn timer_group_label(&self) -> String {
        describe(&self.timer_group)
    }
}

/// Timings and pool size shared by every scenario of a run.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioSettings {
    /// A scenario without a response after this long is a deadlock.
    pub timeout: Duration,
    pub timer_period: Duration,
    pub manual_call_delay: Duration,
    /// Worker pool size of the demo node's executor.
    pub worker_threads: usize,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            timer_period: Duration::from_secs(1),
            manual_call_delay: Duration::from_secs(1),
            worker_threads: default_thread_count(),
        }
    }
}

impl ScenarioSettings {
    /// The deadlock bound starts before the first request goes out, so it
    /// must outlast both the first timer tick and the manual call delay.
    pub fn check_timeout(&self) -> Result<()> {
        let first_call = self.timer_period.max(self.manual_call_delay);
        if self.timeout <= first_call {
            return Err(DemoError::ConfigError(format!(
                "timeout_ms ({} ms) must be greater than timer_period_ms and manual_call_delay_ms ({} ms)",
                self.timeout.as_millis(),
                first_call.as_millis()
            )));
        }
        Ok(())
    }
}

/// The built-in scenario table, in run order.
pub fn builtin_scenarios() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec {
            name: "manual-default".to_string(),
            description: "one call from outside the executor, no timer".to_string(),
            client_group: None,
            timer_group: None,
            trigger: TriggerMode::Manual,
            expect: Expectation::Completes,
        },
        ScenarioSpec {
            name: "timer-default".to_string(),
            description: "timer and client share the node's default exclusive group".to_string(),
            client_group: None,
            timer_group: None,
            trigger: TriggerMode::Timer,
            expect: Expectation::Deadlock,
        },
        ScenarioSpec {
            name: "client-exclusive".to_string(),
            description: "client in its own exclusive group".to_string(),
            client_group: Some(GroupSpec::exclusive("A")),
            timer_group: None,
            trigger: TriggerMode::Timer,
            expect: Expectation::Completes,
        },
        ScenarioSpec {
            name: "timer-exclusive".to_string(),
            description: "timer in its own exclusive group".to_string(),
            client_group: None,
            timer_group: Some(GroupSpec::exclusive("B")),
            trigger: TriggerMode::Timer,
            expect: Expectation::Completes,
        },
        ScenarioSpec {
            name: "distinct-exclusive".to_string(),
            description: "client and timer in two different exclusive groups".to_string(),
            client_group: Some(GroupSpec::exclusive("A")),
            timer_group: Some(GroupSpec::exclusive("B")),
            trigger: TriggerMode::Timer,
            expect: Expectation::Completes,
        },
        ScenarioSpec {
            name: "shared-exclusive".to_string(),
            description: "client and timer in the same exclusive group".to_string(),
            client_group: Some(GroupSpec::exclusive("A")),
            timer_group: Some(GroupSpec::exclusive("A")),
            trigger: TriggerMode::Timer,
            expect: Expectation::Deadlock,
        },
        ScenarioSpec {
            name: "shared-reentrant".to_string(),
            description: "client and timer in the same reentrant group".to_string(),
            client_group: Some(GroupSpec::reentrant("C")),
            timer_group: Some(GroupSpec::reentrant("C")),
            trigger: TriggerMode::Timer,
            expect: Expectation::Completes,
        },
    ]
}

/// Pick scenarios by name or 1-based index, keeping table order.
///
/// An empty filter selects everything.
pub fn select_scenarios(all: &[ScenarioSpec], filters: &[String]) -> Result<Vec<ScenarioSpec>> {
    if filters.is_empty() {
        return Ok(all.to_vec());
    }

    let mut wanted = vec![false; all.len()];
    for filter in filters {
        let position = match filter.trim().parse::<usize>() {
            Ok(index) if (1..=all.len()).contains(&index) => Some(index - 1),
            _ => all.iter().position(|spec| spec.name == filter.trim()),
        };
        match position {
            Some(index) => wanted[index] = true,
            None => {
                return Err(DemoError::ConfigError(format!(
                    "unknown scenario '{filter}' (use --list to see available scenarios)"
                )));
            }
        }
    }

    Ok(all
        .iter()
        .zip(wanted)
        .filter_map(|(spec, keep)| keep.then(|| spec.clone()))
        .collect())
}
