// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::executor::default_thread_count;
use crate::scenario::{ScenarioSettings, ScenarioSpec, builtin_scenarios};
use crate::types::{CallbackGroupKind, Expectation, TriggerMode};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// timeout_ms = 3000
/// timer_period_ms = 1000
///
/// [group.A]
/// kind = "exclusive"
///
/// [scenario.custom]
/// client_group = "A"
/// timer_group = "A"
/// trigger = "timer"
/// expect = "deadlock"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Timings and pool size from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Named callback groups from `[group.<name>]`.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,

    /// Extra scenarios from `[scenario.<name>]`.
    #[serde(default)]
    pub scenario: BTreeMap<String, ScenarioConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Per-scenario bound after which a missing response counts as deadlock.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Period of the timer that issues calls in timer-driven scenarios.
    #[serde(default = "default_timer_period_ms")]
    pub timer_period_ms: u64,

    /// Delay before the single call of a manual scenario.
    #[serde(default = "default_manual_call_delay_ms")]
    pub manual_call_delay_ms: u64,

    /// Worker pool size of the client executor.
    #[serde(default = "default_thread_count")]
    pub worker_threads: usize,

    /// Whether the built-in scenario table runs before the custom ones.
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_timer_period_ms() -> u64 {
    1000
}

fn default_manual_call_delay_ms() -> u64 {
    1000
}

fn default_include_builtin() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            timer_period_ms: default_timer_period_ms(),
            manual_call_delay_ms: default_manual_call_delay_ms(),
            worker_threads: default_thread_count(),
            include_builtin: default_include_builtin(),
        }
    }
}

impl ConfigSection {
    pub fn settings(&self) -> ScenarioSettings {
        ScenarioSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            timer_period: Duration::from_millis(self.timer_period_ms),
            manual_call_delay: Duration::from_millis(self.manual_call_delay_ms),
            worker_threads: self.worker_threads,
        }
    }
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub kind: CallbackGroupKind,
}

/// `[scenario.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Group of the client (and so of its response handler). `None` means
    /// the node's default group.
    #[serde(default)]
    pub client_group: Option<String>,

    /// Group of the timer. `None` means the node's default group.
    #[serde(default)]
    pub timer_group: Option<String>,

    #[serde(default)]
    pub trigger: TriggerMode,

    pub expect: Expectation,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or `Default`), so
/// every group reference in it resolves.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    scenarios: Vec<ScenarioSpec>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ConfigSection::default(), builtin_scenarios())
    }
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, scenarios: Vec<ScenarioSpec>) -> Self {
        Self { config, scenarios }
    }

    /// Scenarios to run, in order.
    pub fn scenarios(&self) -> &[ScenarioSpec] {
        &self.scenarios
    }

    pub fn settings(&self) -> ScenarioSettings {
        self.config.settings()
    }
}
