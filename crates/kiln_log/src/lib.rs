//! Injected logging collaborator for the Kiln engine components.
//!
//! The cache, dependency graph, change tracker and build orchestrator never log
//! through a process-wide logger. Each receives a [`SharedSink`] at construction
//! and reports [`LogEvent`]s through it. [`TracingSink`] forwards events to
//! `tracing`; [`MemorySink`] captures them so tests can assert on what was
//! reported without installing a subscriber.

#![warn(missing_docs)]

pub mod event;
pub mod level;
pub mod sink;

pub use event::{Component, LogEvent};
pub use level::Level;
pub use sink::{null_sink, tracing_sink, EventSink, MemorySink, NullSink, SharedSink, TracingSink};
