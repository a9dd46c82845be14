//! Log levels ordered from least to most severe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a [`LogEvent`](crate::LogEvent).
///
/// Ordered from least severe (`Debug`) to most severe (`Error`), matching the
/// derived `PartialOrd`/`Ord` implementation based on declaration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Internal bookkeeping useful when diagnosing cache behaviour.
    Debug,
    /// Progress of a build run.
    Info,
    /// A degraded but recoverable condition (cache disabled, state reset).
    Warn,
    /// A failure that is also being returned to the caller.
    Error,
}

impl Level {
    /// Returns `true` for [`Warn`](Level::Warn) and [`Error`](Level::Error).
    pub fn is_problem(self) -> bool {
        self >= Level::Warn
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => write!(f, "debug"),
            Level::Info => write!(f, "info"),
            Level::Warn => write!(f, "warn"),
            Level::Error => write!(f, "error"),
        }
    }
}
