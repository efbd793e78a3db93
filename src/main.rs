use std::process::ExitCode;

use clap::Parser;
use netmirror::cli::{AppContext, Cli, Commands};
use netmirror::core::ExitStatus;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = cli.context();
    init_logging(&ctx);

    let outcome = match cli.command {
        Commands::Sync(args) => netmirror::sync_run(args, &ctx),
        Commands::Check(args) => netmirror::check_run(args, &ctx),
        Commands::Init(args) => {
            netmirror::infra::config_init(args, &ctx).map(|()| ExitStatus::Success)
        }
        Commands::Completions(args) => {
            netmirror::completion::run(args, &ctx).map(|()| ExitStatus::Success)
        }
    };

    match outcome {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitStatus::for_error(&err).into()
        }
    }
}

/// Logs go to stderr; stdout carries the rendered plan. `RUST_LOG` wins
/// over the -v/--quiet flags when set.
fn init_logging(ctx: &AppContext) {
    let level = if ctx.quiet {
        "error"
    } else {
        match ctx.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
