// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scenario '{scenario}' references unknown callback group '{group}'")]
    UnknownGroup { scenario: String, group: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Runtime has not been started (or was already stopped)")]
    NotStarted,

    #[error("Executor '{0}' is already spinning or was shut down")]
    AlreadySpinning(String),

    #[error("Node '{node}' is already bound to executor '{executor}'")]
    NodeAlreadyBound { node: String, executor: String },

    #[error("Node '{0}' has not been added to an executor")]
    NodeNotBound(String),

    #[error("Service not available: {0}")]
    ServiceUnavailable(String),

    #[error("Service '{service}' has type {actual}, but {expected} was requested")]
    ServiceTypeMismatch {
        service: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Service '{0}' is already registered")]
    DuplicateService(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Runtime shut down while waiting")]
    Shutdown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DemoError>;
