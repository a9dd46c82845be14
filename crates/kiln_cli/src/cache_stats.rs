//! `kiln cache-stats`: report on the configured content cache.

use serde::Serialize;
use std::collections::BTreeMap;

use kiln_build::resolve_config;
use kiln_cache::{CacheStats, ContentCache};
use kiln_config::{CacheBackend, ProjectConfig};
use kiln_log::tracing_sink;

use crate::project::load_project;
use crate::GlobalArgs;

/// Cache settings plus the stats of every namespace found on disk.
#[derive(Debug, Serialize)]
pub struct CacheReport {
    /// Whether caching is switched on.
    pub enabled: bool,
    /// Configured backend.
    pub backend: CacheBackend,
    /// Stats per artifact namespace. Always empty for the memory backend,
    /// whose entries do not outlive the build process.
    pub namespaces: BTreeMap<String, CacheStats>,
}

/// Runs the `kiln cache-stats` command. Returns exit code 0.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    let report = collect(&resolve_config(&root, &config))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

/// Reads the stats of each namespace under the resolved cache directory.
///
/// Entry payloads are never decoded here, so each cache is opened over
/// untyped JSON values.
pub fn collect(config: &ProjectConfig) -> std::io::Result<CacheReport> {
    let mut report = CacheReport {
        enabled: config.cache.enabled,
        backend: config.cache.backend,
        namespaces: BTreeMap::new(),
    };
    if config.cache.backend != CacheBackend::Filesystem {
        return Ok(report);
    }

    let dir = config.cache.directory_or_default();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let cache = ContentCache::<serde_json::Value>::new(
            config.cache.namespaced(&name),
            tracing_sink(),
        );
        report.namespaces.insert(name, cache.get_stats());
    }
    Ok(report)
}
