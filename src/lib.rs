//! **netmirror** - One-way, no-delete mirroring of a read-only directory tree
//!
//! Walks the source tree once, prunes excluded directories before descending,
//! classifies every file against the destination by size and mtime, and only
//! then (when asked) copies through hidden `.nmirror.part` temp files renamed
//! into place.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Sync-plan engine - matcher, classifier, planner, applier and rendering
pub mod core {
    /// Error taxonomy and exit-status mapping
    pub mod error;
    pub use error::{EntryIssue, ExitStatus, IssueKind, MirrorError};

    /// Exclusion rules with fixed any-match-wins semantics
    pub mod exclude;
    pub use exclude::{ExclusionMatcher, ExclusionRule, ExclusionRules};

    /// Size + mtime comparison against the destination mirror
    pub mod classify;
    pub use classify::{MTIME_TOLERANCE, SourceMeta, classify};

    /// One-shot plan built from a single walk of the source tree
    pub mod plan;
    pub use plan::{Action, ActionCounts, EntryKind, Plan, PlanEntry, Planner};

    /// Atomic copy of ADD/UPDATE entries via hidden `.nmirror.part` temp files
    pub mod apply;
    pub use apply::{ApplyFailure, ApplyReport, Applier};

    /// Text and JSON rendering of plans and apply results
    pub mod report;
    pub use report::{Renderer, plan_json};

    /// `sync` and `check` command handlers
    pub mod sync;
    pub use sync::{check as check_run, run as sync_run};
}

/// Infrastructure - Configuration, paths and traversal
pub mod infra {
    /// Job descriptor loading (YAML/TOML/JSON + env overrides)
    pub mod config;
    pub use config::{JobDescriptor, init as config_init, load_job};

    /// Root normalization into absolute, long-path-safe forms
    pub mod paths;

    /// Depth-first source walker with eager directory pruning
    pub mod walk;
    pub use walk::{SourceWalker, WalkEntry, WalkEvent};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{check_run, sync_run};
pub use crate::infra::{JobDescriptor, load_job};

// Core types for external consumers
pub use crate::core::{Action, Applier, ExitStatus, MirrorError, Plan, PlanEntry, Planner};
