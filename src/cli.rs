use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: u8,    // global -v count
}

impl AppContext {
    /// Progress bars only make sense for interactive, non-quiet runs
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

#[derive(Parser)]
#[command(name = "nmirror")]
#[command(
    about = "One-way, no-delete mirror of a read-only (network) directory with a dry-run plan"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan a mirror run and optionally apply it
    Sync(SyncArgs),

    /// Validate a job file and print its summary
    Check(CheckArgs),

    /// Write a commented netmirror.yaml job template
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Job file (.yaml, .yml, .toml or .json)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Copy files; without this flag the run is a dry run
    #[arg(long)]
    pub apply: bool,

    /// Group relative paths by action under a one-line roots header
    #[arg(long, conflicts_with = "json")]
    pub compact: bool,

    /// Emit the plan (and apply results) as a JSON document
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Job file to validate
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Directory to write netmirror.yaml into
    #[arg(default_value = ".", value_hint = ValueHint::DirPath)]
    pub path: PathBuf,

    /// Overwrite an existing job file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Directory to write the script into (file named for the shell)
    #[arg(
        long,
        conflicts_with = "stdout",
        required_unless_present = "stdout",
        value_hint = ValueHint::DirPath
    )]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
