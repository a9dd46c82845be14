//! Structured log events emitted by engine components.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::level::Level;

/// The engine component that produced an event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// The content-addressed cache.
    Cache,
    /// The dependency graph.
    Graph,
    /// The file change tracker.
    Tracker,
    /// The build orchestrator.
    Build,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Cache => write!(f, "cache"),
            Component::Graph => write!(f, "graph"),
            Component::Tracker => write!(f, "tracker"),
            Component::Build => write!(f, "build"),
        }
    }
}

/// A single log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// How severe the event is.
    pub level: Level,
    /// Which component emitted it.
    pub component: Component,
    /// Human-readable message.
    pub message: String,
}

impl LogEvent {
    /// Creates an event with an explicit level.
    pub fn new(level: Level, component: Component, message: impl Into<String>) -> Self {
        Self {
            level,
            component,
            message: message.into(),
        }
    }

    /// Creates a [`Level::Debug`] event.
    pub fn debug(component: Component, message: impl Into<String>) -> Self {
        Self::new(Level::Debug, component, message)
    }

    /// Creates a [`Level::Info`] event.
    pub fn info(component: Component, message: impl Into<String>) -> Self {
        Self::new(Level::Info, component, message)
    }

    /// Creates a [`Level::Warn`] event.
    pub fn warn(component: Component, message: impl Into<String>) -> Self {
        Self::new(Level::Warn, component, message)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.level, self.component, self.message)
    }
}
