//! `kiln clean`: remove the cache, build state and dependency graph.

use kiln_build::resolve_config;

use crate::project::load_project;
use crate::GlobalArgs;

/// Runs the `kiln clean` command. Returns exit code 0.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    let config = resolve_config(&root, &config);
    let removed = kiln_build::clean(&config)?;

    if !global.quiet {
        if removed.is_empty() {
            println!("nothing to clean");
        }
        for path in &removed {
            println!("removed {}", path.display());
        }
    }
    Ok(0)
}
