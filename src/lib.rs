// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod group;
pub mod logging;
pub mod node;
pub mod scenario;
pub mod types;

use anyhow::{Context, Result};
use crossbeam::channel;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::scenario::{ScenarioSettings, print_scenario_table, run_all, select_scenarios};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - scenario selection
/// - Ctrl-C handling
/// - the blocking scenario driver
///
/// Returns `false` when `--fail-on-mismatch` is set and some scenario did
/// not behave as expected.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = match args.config {
        Some(ref path) => load_and_validate(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let settings = apply_overrides(cfg.settings(), &args)?;
    let scenarios = select_scenarios(cfg.scenarios(), &args.scenario)?;

    if args.list {
        print_scenario_table(&scenarios, &settings);
        return Ok(true);
    }

    // Ctrl-C → end the scenario that is currently running.
    let (interrupt_tx, interrupt_rx) = channel::unbounded::<()>();
    let ctrl_c = tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if interrupt_tx.send(()).is_err() {
                return;
            }
        }
    });

    info!(count = scenarios.len(), "running callback group scenarios");
    let summary =
        tokio::task::spawn_blocking(move || run_all(&scenarios, &settings, &interrupt_rx))
            .await
            .context("scenario driver task failed")??;
    ctrl_c.abort();

    summary.print();
    debug!(passed = summary.passed(), total = summary.reports.len(), "run complete");

    Ok(!args.fail_on_mismatch || summary.all_passed())
}

/// CLI flags win over the config file.
fn apply_overrides(mut settings: ScenarioSettings, args: &CliArgs) -> Result<ScenarioSettings> {
    if let Some(ms) = args.timeout_ms {
        if ms == 0 {
            anyhow::bail!("--timeout-ms must be >= 1");
        }
        settings.timeout = std::time::Duration::from_millis(ms);
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            anyhow::bail!("--threads must be >= 1");
        }
        settings.worker_threads = threads;
    }
    settings.check_timeout()?;
    Ok(settings)
}
