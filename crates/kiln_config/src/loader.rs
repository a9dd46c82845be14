//! Configuration file loading and validation.

use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::types::{CacheBackend, ProjectConfig};
use std::path::Path;

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates `kiln.toml` from a project directory.
///
/// A missing file is not an error: the defaults are returned. Relative paths
/// in the result are left relative; see [`ProjectConfig::resolve_paths`].
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    match std::fs::read_to_string(&config_path) {
        Ok(content) => load_config_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectConfig::default()),
        Err(e) => Err(ConfigError::IoError(e)),
    }
}

/// Parses and validates a `kiln.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    check_durations(&table)?;
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Rejects malformed duration strings with their own error rather than a
/// generic parse failure.
fn check_durations(table: &toml::Table) -> Result<(), ConfigError> {
    let ttl = table
        .get("cache")
        .and_then(|cache| cache.get("ttl"))
        .and_then(toml::Value::as_str);
    if let Some(ttl) = ttl {
        parse_duration(ttl)?;
    }
    Ok(())
}

/// Checks value ranges and cross-field consistency.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.cache.max_entries == Some(0) {
        return Err(ConfigError::ValidationError(
            "cache.max_entries must be positive".to_string(),
        ));
    }
    if config.cache.backend == CacheBackend::Filesystem && config.cache.max_entries.is_some() {
        return Err(ConfigError::ValidationError(
            "cache.max_entries only applies to the memory backend".to_string(),
        ));
    }
    if config.tracker.state_file.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tracker.state_file must not be empty".to_string(),
        ));
    }
    if config.graph.state_file.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "graph.state_file must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_config_is_default() {
        let config = load_config_from_str("").unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl, None);
        assert!(config.tracker.enabled);
        assert!(!config.tracker.force_rebuild);
        assert!(config.tracker.ignore.contains(&".git".to_string()));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[cache]
enabled = true
backend = "filesystem"
ttl = "24h"
directory = "out/cache"

[tracker]
enabled = true
force_rebuild = true
state_file = "out/state.json"
ignore = ["vendor"]
verify_content = true

[graph]
state_file = "out/graph.json"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Filesystem);
        assert_eq!(config.cache.ttl, Some(Duration::from_secs(86_400)));
        assert_eq!(config.cache.directory, Some(PathBuf::from("out/cache")));
        assert!(config.tracker.force_rebuild);
        assert!(config.tracker.verify_content);
        assert_eq!(config.tracker.ignore, vec!["vendor"]);
        assert_eq!(config.graph.state_file, PathBuf::from("out/graph.json"));
    }

    #[test]
    fn ttl_as_integer_seconds() {
        let config = load_config_from_str("[cache]\nttl = 90\n").unwrap();
        assert_eq!(config.cache.ttl, Some(Duration::from_secs(90)));
    }

    #[test]
    fn memory_backend_with_bound() {
        let config = load_config_from_str("[cache]\nmax_entries = 2\n").unwrap();
        assert_eq!(config.cache.max_entries, Some(2));
    }

    #[test]
    fn zero_max_entries_rejected() {
        let err = load_config_from_str("[cache]\nmax_entries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn max_entries_on_filesystem_rejected() {
        let toml = "[cache]\nbackend = \"filesystem\"\nmax_entries = 10\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("memory backend"));
    }

    #[test]
    fn bad_ttl_is_invalid_duration() {
        let err = load_config_from_str("[cache]\nttl = \"10 parsecs\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { ref input, .. } if input == "10 parsecs"
        ));
        assert!(err.to_string().contains("unknown unit 'parsecs'"));
    }

    #[test]
    fn negative_ttl_is_parse_error() {
        let err = load_config_from_str("[cache]\nttl = -5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_backend_is_parse_error() {
        let err = load_config_from_str("[cache]\nbackend = \"redis\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[cache]\nenabled = false\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(!config.cache.enabled);
    }
}
