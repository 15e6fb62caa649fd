// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, ConfigSection, GroupConfig, RawConfigFile, ScenarioConfig};
use crate::errors::{DemoError, Result};
use crate::scenario::{GroupSpec, ScenarioSpec, builtin_scenarios};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DemoError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw.config)?;

        let mut scenarios = if raw.config.include_builtin {
            builtin_scenarios()
        } else {
            Vec::new()
        };

        for (name, scenario) in raw.scenario.iter() {
            if scenarios.iter().any(|existing| existing.name == *name) {
                return Err(DemoError::ConfigError(format!(
                    "scenario '{name}' clashes with a built-in scenario name"
                )));
            }
            scenarios.push(resolve_scenario(name, scenario, &raw.group)?);
        }

        if scenarios.is_empty() {
            return Err(DemoError::ConfigError(
                "no scenarios to run: add a [scenario.<name>] section or set include_builtin = true"
                    .to_string(),
            ));
        }

        Ok(ConfigFile::new_unchecked(raw.config, scenarios))
    }
}

fn validate_global_config(cfg: &ConfigSection) -> Result<()> {
    if cfg.timeout_ms == 0 {
        return Err(DemoError::ConfigError(
            "[config].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.timer_period_ms == 0 {
        return Err(DemoError::ConfigError(
            "[config].timer_period_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.worker_threads == 0 {
        return Err(DemoError::ConfigError(
            "[config].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    cfg.settings().check_timeout()
}

fn resolve_scenario(
    name: &str,
    scenario: &ScenarioConfig,
    groups: &BTreeMap<String, GroupConfig>,
) -> Result<ScenarioSpec> {
    let lookup = |group: &Option<String>| -> Result<Option<GroupSpec>> {
        match group {
            None => Ok(None),
            Some(group) => groups
                .get(group)
                .map(|cfg| Some(GroupSpec::new(group.clone(), cfg.kind)))
                .ok_or_else(|| DemoError::UnknownGroup {
                    scenario: name.to_string(),
                    group: group.clone(),
                }),
        }
    };

    Ok(ScenarioSpec {
        name: name.to_string(),
        description: scenario
            .description
            .clone()
            .unwrap_or_else(|| format!("custom scenario '{name}'")),
        client_group: lookup(&scenario.client_group)?,
        timer_group: lookup(&scenario.timer_group)?,
        trigger: scenario.trigger,
        expect: scenario.expect,
    })
}
