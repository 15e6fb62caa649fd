// src/scenario/report.rs

//! Scenario results and the human-readable summary.

use std::time::Duration;

use super::{ScenarioSettings, ScenarioSpec};
use crate::types::{Expectation, ScenarioOutcome};

/// Result of running one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// 1-based position in the run.
    pub index: usize,
    pub name: String,
    pub description: String,
    pub expected: Expectation,
    pub outcome: ScenarioOutcome,
    pub elapsed: Duration,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome.matches(self.expected)
    }
}

/// Collected reports of a whole run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub reports: Vec<ScenarioReport>,
}

impl Summary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    pub fn print(&self) {
        println!();
        println!("callback group demo summary");
        for report in &self.reports {
            println!(
                "  {:>2}. {:<20} expected {:<9} got {:<11} {:>6} ms  {}",
                report.index,
                report.name,
                report.expected.to_string(),
                report.outcome.to_string(),
                report.elapsed.as_millis(),
                if report.passed() { "PASS" } else { "FAIL" },
            );
        }
        println!("{}/{} scenarios matched", self.passed(), self.reports.len());
    }
}

/// Dry-run output: print the scenario table without executing anything.
pub fn print_scenario_table(scenarios: &[ScenarioSpec], settings: &ScenarioSettings) {
    println!("cbgroup-demo scenarios");
    println!("  timeout = {:?}", settings.timeout);
    println!("  timer_period = {:?}", settings.timer_period);
    println!("  manual_call_delay = {:?}", settings.manual_call_delay);
    println!("  worker_threads = {}", settings.worker_threads);
    println!();

    for (index, spec) in scenarios.iter().enumerate() {
        println!("  {}. {}", index + 1, spec.name);
        println!("      {}", spec.description);
        println!("      client group: {}", spec.client_group_label());
        println!("      timer group:  {}", spec.timer_group_label());
        println!("      trigger: {}", spec.trigger);
        println!("      expect: {}", spec.expect);
    }
}
