use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Mutual-exclusion policy of a callback group.
///
/// - `Exclusive`: at most one member callback runs at a time, across every
///   worker thread of the executor.
/// - `Reentrant`: members may run concurrently, including the same callback
///   overlapping with itself.
///
/// Parsed case-insensitively, both from TOML and from strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum CallbackGroupKind {
    Exclusive,
    Reentrant,
}

impl TryFrom<String> for CallbackGroupKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for CallbackGroupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclusive" | "mutually_exclusive" => Ok(CallbackGroupKind::Exclusive),
            "reentrant" => Ok(CallbackGroupKind::Reentrant),
            other => Err(format!(
                "invalid callback group kind: {other} (expected \"exclusive\" or \"reentrant\")"
            )),
        }
    }
}

impl fmt::Display for CallbackGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackGroupKind::Exclusive => f.write_str("exclusive"),
            CallbackGroupKind::Reentrant => f.write_str("reentrant"),
        }
    }
}

/// How a scenario issues its client call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// One call from a thread outside the executor.
    Manual,
    /// Calls issued from inside a periodic timer callback.
    Timer,
}

impl Default for TriggerMode {
    fn default() -> Self {
        TriggerMode::Timer
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Manual => f.write_str("manual"),
            TriggerMode::Timer => f.write_str("timer"),
        }
    }
}

/// Outcome a scenario is expected to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Completes,
    Deadlock,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Completes => f.write_str("completes"),
            Expectation::Deadlock => f.write_str("deadlock"),
        }
    }
}

/// Observed classification of a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioOutcome {
    /// A response reached the client within the bound.
    Completed,
    /// No response within the bound.
    Deadlock,
    /// Ctrl-C arrived before either of the above.
    Interrupted,
}

impl ScenarioOutcome {
    pub fn matches(self, expected: Expectation) -> bool {
        matches!(
            (self, expected),
            (ScenarioOutcome::Completed, Expectation::Completes)
                | (ScenarioOutcome::Deadlock, Expectation::Deadlock)
        )
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioOutcome::Completed => f.write_str("completed"),
            ScenarioOutcome::Deadlock => f.write_str("deadlock"),
            ScenarioOutcome::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_kind_parses_both_spellings() {
        assert_eq!("Exclusive".parse::<CallbackGroupKind>(), Ok(CallbackGroupKind::Exclusive));
        assert_eq!(
            "mutually_exclusive".parse::<CallbackGroupKind>(),
            Ok(CallbackGroupKind::Exclusive)
        );
        assert_eq!(" reentrant ".parse::<CallbackGroupKind>(), Ok(CallbackGroupKind::Reentrant));
        assert!("shared".parse::<CallbackGroupKind>().is_err());
    }

    #[test]
    fn only_matching_outcomes_pass() {
        assert!(ScenarioOutcome::Completed.matches(Expectation::Completes));
        assert!(ScenarioOutcome::Deadlock.matches(Expectation::Deadlock));
        assert!(!ScenarioOutcome::Deadlock.matches(Expectation::Completes));
        assert!(!ScenarioOutcome::Interrupted.matches(Expectation::Deadlock));
        assert_eq!(TriggerMode::default(), TriggerMode::Timer);
    }
}
