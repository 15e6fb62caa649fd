// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every flag is optional: with none, the built-in scenario table runs with
//! default timings.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cbgroup-demo`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "cbgroup-demo",
    version,
    about = "Show which callback group layouts make a blocking service call deadlock.",
    long_about = None
)]
pub struct CliArgs {
    /// Optional TOML file with timings, named groups and extra scenarios.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run only these scenarios (name or 1-based index). Repeatable.
    #[arg(long, value_name = "NAME|INDEX")]
    pub scenario: Vec<String>,

    /// Per-scenario bound in milliseconds before a missing response counts
    /// as deadlock. Overrides the config file.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Worker threads of the demo node's executor. Overrides the config file.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Print the scenario table, but don't run anything.
    #[arg(long)]
    pub list: bool,

    /// Exit with status 1 if any scenario did not match its expectation.
    #[arg(long)]
    pub fail_on_mismatch: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CBGROUP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
