//! Event sinks: where engine components send their log events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::event::LogEvent;
use crate::level::Level;

/// Receiver for log events.
///
/// Implementations must be thread-safe: the tracker hashes files on a rayon
/// pool and a sink may be shared between several components.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: LogEvent);
}

/// A sink shared between engine components.
pub type SharedSink = Arc<dyn EventSink>;

/// Forwards events to the `tracing` macros, with the component as a field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let component = event.component;
        match event.level {
            Level::Debug => tracing::debug!(%component, "{}", event.message),
            Level::Info => tracing::info!(%component, "{}", event.message),
            Level::Warn => tracing::warn!(%component, "{}", event.message),
            Level::Error => tracing::error!(%component, "{}", event.message),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: LogEvent) {}
}

/// Returns a shared [`TracingSink`].
pub fn tracing_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Returns a shared [`NullSink`].
pub fn null_sink() -> SharedSink {
    Arc::new(NullSink)
}

/// A thread-safe accumulator for log events.
///
/// The count of warn-or-worse events is tracked atomically for fast
/// [`problem_count`](Self::problem_count) checks without locking the vector.
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
    problem_count: AtomicUsize,
}

impl MemorySink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            problem_count: AtomicUsize::new(0),
        }
    }

    /// Creates a new empty sink already wrapped in an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the number of [`Warn`](Level::Warn) or [`Error`](Level::Error) events seen.
    pub fn problem_count(&self) -> usize {
        self.problem_count.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all events without draining.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if any event at `level` contains `needle` in its message.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        if event.level.is_problem() {
            self.problem_count.fetch_add(1, Ordering::Relaxed);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Component;

    #[test]
    fn empty_sink() {
        let sink = MemorySink::new();
        assert_eq!(sink.problem_count(), 0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn warn_counts_as_problem() {
        let sink = MemorySink::new();
        sink.emit(LogEvent::warn(Component::Cache, "directory unavailable"));
        sink.emit(LogEvent::debug(Component::Cache, "evicted 1"));
        assert_eq!(sink.problem_count(), 1);
        assert_eq!(sink.events().len(), 2);
        assert!(sink.contains(Level::Warn, "unavailable"));
        assert!(!sink.contains(Level::Warn, "evicted"));
    }

    #[test]
    fn error_counts_as_problem() {
        let sink = MemorySink::new();
        sink.emit(LogEvent::new(Level::Error, Component::Tracker, "a"));
        sink.emit(LogEvent::info(Component::Build, "b"));
        assert_eq!(sink.problem_count(), 1);
    }

    #[test]
    fn usable_as_shared_sink() {
        let memory = MemorySink::shared();
        let shared: SharedSink = memory.clone();
        shared.emit(LogEvent::info(Component::Graph, "hello"));
        assert_eq!(memory.events().len(), 1);
    }

    #[test]
    fn null_and_tracing_sinks_accept_events() {
        null_sink().emit(LogEvent::warn(Component::Cache, "ignored"));
        tracing_sink().emit(LogEvent::warn(Component::Cache, "no subscriber installed"));
    }

    #[test]
    fn thread_safety() {
        use std::thread;

        let sink = MemorySink::shared();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    sink.emit(LogEvent::warn(Component::Tracker, "w"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.problem_count(), 400);
        assert_eq!(sink.events().len(), 400);
    }
}
