//! Parsing and validation of `kiln.toml` engine configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`] holding the cache, change-tracker and dependency-graph
//! settings. Every section is optional; an absent file yields the defaults.

#![warn(missing_docs)]

pub mod duration;
pub mod error;
pub mod loader;
pub mod types;

pub use duration::parse_duration;
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
