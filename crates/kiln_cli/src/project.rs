//! Project discovery, configuration loading and logging setup shared by all
//! commands.

use std::path::{Path, PathBuf};

use kiln_config::{load_config, load_config_from_str, ProjectConfig, CONFIG_FILE_NAME};
use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Installs the `tracing` subscriber that receives engine events.
///
/// `RUST_LOG` takes precedence; otherwise `--quiet` shows errors only,
/// `--verbose` shows info and above, and the default is warnings.
pub fn init_tracing(global: &GlobalArgs) {
    let default = if global.quiet {
        "error"
    } else if global.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
///
/// Falls back to `start` itself: the configuration file is optional.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).is_file() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

/// Resolves the project root and loads its configuration.
///
/// If `--config` names a file, that file is parsed and its directory is the
/// root. If it names a directory, that directory is the root. Otherwise the
/// root is found by walking up from the current directory.
pub fn load_project(global: &GlobalArgs) -> Result<(PathBuf, ProjectConfig), Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) if path.is_file() => {
            let content = std::fs::read_to_string(path)?;
            let config = load_config_from_str(&content)?;
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((root, config))
        }
        Some(dir) => Ok((dir.clone(), load_config(dir)?)),
        None => {
            let root = find_project_root(&std::env::current_dir()?);
            let config = load_config(&root)?;
            Ok((root, config))
        }
    }
}
