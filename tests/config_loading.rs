// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use cbgroup_demo::config::{load_and_validate, load_from_path};
use cbgroup_demo::errors::DemoError;
use cbgroup_demo::scenario::GroupSpec;
use cbgroup_demo::types::{Expectation, TriggerMode};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn custom_scenarios_follow_the_builtin_table() {
    let file = config_file(
        r#"
[config]
timeout_ms = 500
timer_period_ms = 100
manual_call_delay_ms = 200
worker_threads = 3

[group.shared]
kind = "exclusive"

[group.loose]
kind = "reentrant"

[scenario.custom-deadlock]
description = "both in one exclusive group"
client_group = "shared"
timer_group = "shared"
expect = "deadlock"

[scenario.custom-manual]
client_group = "loose"
trigger = "manual"
expect = "completes"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let names: Vec<_> = cfg.scenarios().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names.len(), 9);
    assert_eq!(names[0], "manual-default");
    assert_eq!(&names[7..], &["custom-deadlock", "custom-manual"]);

    let deadlock = &cfg.scenarios()[7];
    assert_eq!(deadlock.client_group, Some(GroupSpec::exclusive("shared")));
    assert_eq!(deadlock.timer_group, deadlock.client_group);
    assert_eq!(deadlock.trigger, TriggerMode::Timer);
    assert_eq!(deadlock.expect, Expectation::Deadlock);

    let manual = &cfg.scenarios()[8];
    assert_eq!(manual.client_group, Some(GroupSpec::reentrant("loose")));
    assert_eq!(manual.timer_group, None);
    assert_eq!(manual.trigger, TriggerMode::Manual);
    assert!(manual.description.contains("custom-manual"));

    let settings = cfg.settings();
    assert_eq!(settings.timeout, Duration::from_millis(500));
    assert_eq!(settings.timer_period, Duration::from_millis(100));
    assert_eq!(settings.manual_call_delay, Duration::from_millis(200));
    assert_eq!(settings.worker_threads, 3);
}

#[test]
fn group_kind_is_case_insensitive() {
    let file = config_file(
        r#"
[group.A]
kind = "Exclusive"

[group.B]
kind = "REENTRANT"

[scenario.mixed-case]
client_group = "A"
timer_group = "B"
expect = "completes"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let scenario = cfg.scenarios().last().unwrap();
    assert_eq!(scenario.client_group, Some(GroupSpec::exclusive("A")));
    assert_eq!(scenario.timer_group, Some(GroupSpec::reentrant("B")));
}

#[test]
fn unknown_group_kind_is_a_toml_error() {
    let file = config_file("[group.A]\nkind = \"shared\"\n");
    assert!(matches!(load_from_path(file.path()), Err(DemoError::TomlError(_))));
}

#[test]
fn builtin_table_can_be_left_out() {
    let file = config_file(
        r#"
[config]
include_builtin = false

[group.A]
kind = "mutually_exclusive"

[scenario.only]
client_group = "A"
expect = "completes"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.scenarios().len(), 1);
    assert_eq!(cfg.scenarios()[0].client_group, Some(GroupSpec::exclusive("A")));
}

#[test]
fn unknown_group_is_reported() {
    let file = config_file(
        r#"
[scenario.broken]
timer_group = "nowhere"
expect = "deadlock"
"#,
    );

    match load_and_validate(file.path()) {
        Err(DemoError::UnknownGroup { scenario, group }) => {
            assert_eq!(scenario, "broken");
            assert_eq!(group, "nowhere");
        }
        other => panic!("expected UnknownGroup, got {other:?}"),
    }
}

#[test]
fn zero_timeout_is_rejected() {
    let file = config_file("[config]\ntimeout_ms = 0\n");
    match load_and_validate(file.path()) {
        Err(DemoError::ConfigError(msg)) => assert!(msg.contains("timeout_ms")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn timeout_not_longer_than_timer_period_is_rejected() {
    let file = config_file("[config]\ntimeout_ms = 200\ntimer_period_ms = 5000\n");
    match load_and_validate(file.path()) {
        Err(DemoError::ConfigError(msg)) => {
            assert!(msg.contains("timeout_ms"));
            assert!(msg.contains("5000"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn timeout_not_longer_than_manual_delay_is_rejected() {
    let file = config_file(
        "[config]\ntimeout_ms = 1000\ntimer_period_ms = 100\nmanual_call_delay_ms = 1000\n",
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DemoError::ConfigError(msg)) if msg.contains("manual_call_delay_ms")
    ));
}

#[test]
fn builtin_name_clash_is_rejected() {
    let file = config_file(
        r#"
[scenario.shared-exclusive]
expect = "completes"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DemoError::ConfigError(msg)) if msg.contains("shared-exclusive")
    ));
}

#[test]
fn empty_scenario_list_is_rejected() {
    let file = config_file("[config]\ninclude_builtin = false\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DemoError::ConfigError(_))
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = config_file("[config\ntimeout_ms = ");
    assert!(matches!(load_from_path(file.path()), Err(DemoError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(load_and_validate(&missing), Err(DemoError::IoError(_))));
}

#[test]
fn empty_file_uses_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.scenarios().len(), 7);
    assert_eq!(cfg.settings().timeout, Duration::from_secs(3));
}
