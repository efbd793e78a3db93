//! `nmirror completions`: shell scripts generated from the clap definition.
//!
//! Job-file and directory arguments carry value hints, so shells that
//! understand them (zsh, fish) complete paths for `--config`, `init` and
//! `--out-dir`.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Generator, Shell};
use tracing::info;

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN_NAME: &str = "nmirror";

/// Render the completion script for `shell` into memory.
pub fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, &mut buf);
    buf
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let body = script(args.shell);

    let Some(dir) = args.out_dir else {
        io::stdout()
            .lock()
            .write_all(&body)
            .context("write completion script to stdout")?;
        return Ok(());
    };

    let path = install(&dir, args.shell, &body)?;
    info!(shell = %args.shell, path = %path.display(), "completion script written");
    if !ctx.quiet {
        eprintln!("Wrote {} completion to {}", args.shell, path.display());
    }
    Ok(())
}

fn install(dir: &Path, shell: Shell, body: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(shell.file_name(BIN_NAME));
    fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
