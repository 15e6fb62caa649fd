#![allow(dead_code)]

use std::time::Duration;

use cbgroup_demo::scenario::{GroupSpec, ScenarioSettings, ScenarioSpec};
use cbgroup_demo::types::{Expectation, TriggerMode};

/// Settings small enough for tests: the timer fires quickly and a deadlock
/// is declared after one second.
pub fn fast_settings() -> ScenarioSettings {
    ScenarioSettings {
        timeout: Duration::from_millis(1000),
        timer_period: Duration::from_millis(50),
        manual_call_delay: Duration::from_millis(50),
        worker_threads: 4,
    }
}

/// Builder for `ScenarioSpec` to simplify test setup.
pub struct ScenarioBuilder {
    spec: ScenarioSpec,
}

impl ScenarioBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: ScenarioSpec {
                name: name.to_string(),
                description: String::new(),
                client_group: None,
                timer_group: None,
                trigger: TriggerMode::Timer,
                expect: Expectation::Completes,
            },
        }
    }

    pub fn client_group(mut self, group: GroupSpec) -> Self {
        self.spec.client_group = Some(group);
        self
    }

    pub fn timer_group(mut self, group: GroupSpec) -> Self {
        self.spec.timer_group = Some(group);
        self
    }

    pub fn manual(mut self) -> Self {
        self.spec.trigger = TriggerMode::Manual;
        self
    }

    pub fn expect(mut self, expect: Expectation) -> Self {
        self.spec.expect = expect;
        self
    }

    pub fn build(self) -> ScenarioSpec {
        self.spec
    }
}
