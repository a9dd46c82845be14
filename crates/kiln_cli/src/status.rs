//! `kiln status`: show what the next build would regenerate.
//!
//! Runs the planning step against the persisted state without committing, so
//! the command can be repeated and always reports the same pending work.

use std::fmt::Write as _;
use std::path::Path;

use kiln_build::{BuildPlan, IncrementalBuild};
use kiln_log::tracing_sink;

use crate::project::load_project;
use crate::{GlobalArgs, StatusArgs};

/// Runs the `kiln status` command. Returns exit code 0.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    let mut build = IncrementalBuild::open(&root, &config, tracing_sink());
    let plan = build.plan(&args.source)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else if !global.quiet {
        print!("{}", render_text(&plan, &root));
    }
    Ok(0)
}

/// Renders a plan as one line per path, relative to `root` where possible.
pub fn render_text(plan: &BuildPlan, root: &Path) -> String {
    if plan.is_empty() {
        return "up to date\n".to_string();
    }
    let rel = |p: &Path| p.strip_prefix(root).unwrap_or(p).display().to_string();

    let mut out = String::new();
    let sections: [(&str, Vec<&Path>); 4] = [
        ("changed", plan.changed.iter().map(|p| p.as_path()).collect()),
        ("deleted", plan.deleted.iter().map(|p| p.as_path()).collect()),
        ("rebuild", plan.files.iter().map(|p| p.as_path()).collect()),
        ("output", plan.outputs.iter().map(|p| p.as_path()).collect()),
    ];
    for (label, paths) in sections {
        for path in paths {
            let _ = writeln!(out, "{label:>8}  {}", rel(path));
        }
    }
    let _ = writeln!(
        out,
        "{} changed, {} deleted, {} to rebuild",
        plan.changed.len(),
        plan.deleted.len(),
        plan.files.len()
    );
    out
}
