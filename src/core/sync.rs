//! `sync` and `check` command handlers.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::{AppContext, CheckArgs, SyncArgs};
use crate::core::{
    apply::Applier,
    error::ExitStatus,
    plan::Planner,
    report::{Renderer, plan_json},
};
use crate::infra::config::load_job;

/// Plan the job and, with `--apply`, execute it. The plan is always built
/// fresh; dry run and apply share the same planning pass.
pub fn run(args: SyncArgs, ctx: &AppContext) -> Result<ExitStatus> {
    let job = load_job(&args.config)
        .with_context(|| format!("Failed to load job {}", args.config.display()))?;
    let renderer = Renderer::for_context(ctx);

    if !args.compact && !args.json {
        println!("{}", renderer.config_summary(&job));
    }

    let plan = Planner::new(&job)?
        .plan()
        .context("Planning failed")?;
    let mut status = if plan.has_issues() {
        ExitStatus::EntryFailures
    } else {
        ExitStatus::Success
    };

    if !args.json {
        print!("{}", renderer.plan(&plan, args.compact));
    }

    if !args.apply {
        if args.json {
            println!("{}", plan_json(&plan, None)?);
        }
        info!("dry run: nothing written");
        return Ok(status);
    }

    let todo = plan.actionable().count() as u64;
    let progress = if ctx.show_progress() && !args.json && todo > 0 {
        let pb = ProgressBar::new(todo);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    } else {
        ProgressBar::hidden()
    };

    let report = Applier::new(&job).apply_with_progress(&plan, |entry| {
        progress.inc(1);
        progress.set_message(entry.relative_path.display().to_string());
    });
    progress.finish_and_clear();

    if !report.is_success() {
        status = status.worst(ExitStatus::EntryFailures);
    }

    if args.json {
        println!("{}", plan_json(&plan, Some(&report))?);
    } else {
        println!();
        print!("{}", renderer.apply_result(&report));
    }

    Ok(status)
}

/// Load and validate a job file without touching either tree.
pub fn check(args: CheckArgs, ctx: &AppContext) -> Result<ExitStatus> {
    let job = load_job(&args.config)
        .with_context(|| format!("Failed to load job {}", args.config.display()))?;
    Planner::new(&job)?;

    if !ctx.quiet {
        print!("{}", Renderer::for_context(ctx).config_summary(&job));
        println!("Job is valid.");
    }
    Ok(ExitStatus::Success)
}
