//! Kiln CLI: inspect and reset the incremental build state of a project.
//!
//! Provides `kiln status` to show what the next run would rebuild,
//! `kiln clean` to drop every cache and state file, and `kiln cache-stats`
//! to report on the configured content cache.

#![warn(missing_docs)]

mod cache_stats;
mod clean;
mod project;
mod status;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

/// Kiln, the incremental build engine for documentation sites.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln incremental build engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (info-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `kiln.toml` file or to the project directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which files and outputs the next build would regenerate.
    Status(StatusArgs),
    /// Delete the cache directory, build state and dependency graph.
    Clean,
    /// Print per-namespace statistics for the configured content cache as JSON.
    CacheStats,
}

/// Arguments for the `kiln status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Source directory to scan, relative to the project root.
    #[arg(short, long, default_value = ".")]
    pub source: PathBuf,

    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose information.
    pub verbose: bool,
    /// Optional path to a config file or project directory.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    project::init_tracing(&global);

    let result = match cli.command {
        Command::Status(ref args) => status::run(args, &global),
        Command::Clean => clean::run(&global),
        Command::CacheStats => cache_stats::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
