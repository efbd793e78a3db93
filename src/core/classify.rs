//! Size + mtime classification of one source file against the destination.
//!
//! No content hashing: a destination file is current when its size matches
//! and its mtime is within [`MTIME_TOLERANCE`] of the source, which absorbs
//! coarse timestamp resolution on network and FAT-style filesystems.

use std::{
    fs::{self, Metadata},
    io,
    path::Path,
    time::{Duration, SystemTime},
};

use crate::core::{
    error::{EntryIssue, IssueKind, MirrorError},
    plan::Action,
};
use crate::infra::paths::join_relative;

/// Inclusive mtime tolerance: exactly 2.0s apart still counts as equal.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

/// Source-side facts the classifier needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
    pub size: u64,
    pub mtime: SystemTime,
}

impl SourceMeta {
    pub fn from_metadata(meta: &Metadata) -> io::Result<Self> {
        Ok(Self {
            size: meta.len(),
            mtime: meta.modified()?,
        })
    }
}

/// Classifier verdict for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub action: Action,
    pub reason: String,
    pub issue: Option<EntryIssue>,
}

impl Classification {
    fn new(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            issue: None,
        }
    }

    fn with_issue(mut self, issue: EntryIssue) -> Self {
        self.issue = Some(issue);
        self
    }
}

/// True when two timestamps are within the tolerance window (either order).
pub fn within_tolerance(a: SystemTime, b: SystemTime) -> bool {
    let diff = a
        .duration_since(b)
        .unwrap_or_else(|earlier| earlier.duration());
    diff <= MTIME_TOLERANCE
}

/// Decide ADD / UPDATE / SKIP for `relative_path` by statting its mirror
/// under `dest_root`.
///
/// Only "not found" counts as missing. Any other destination read error is
/// recorded as a stat issue and the file is scheduled for UPDATE, since
/// attempting the copy is safer than silently skipping it.
pub fn classify(relative_path: &Path, source: &SourceMeta, dest_root: &Path) -> Classification {
    let dest = match join_relative(dest_root, relative_path) {
        Ok(p) => p,
        Err(err) => {
            return Classification::new(Action::Exclude, "invalid path").with_issue(err.to_issue());
        }
    };

    let dest_meta = match fs::metadata(&dest) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Classification::new(Action::Add, "missing");
        }
        Err(e) => {
            let err = MirrorError::Stat {
                path: dest,
                source: e,
            };
            return Classification::new(Action::Update, "dst unreadable")
                .with_issue(err.to_issue());
        }
    };

    if !dest_meta.is_file() {
        return Classification::new(Action::Update, "dst is not a regular file");
    }

    let dest_mtime = match dest_meta.modified() {
        Ok(t) => t,
        Err(e) => {
            let err = MirrorError::Stat {
                path: dest,
                source: e,
            };
            return Classification::new(Action::Update, "dst mtime unavailable")
                .with_issue(err.to_issue());
        }
    };

    let size_same = source.size == dest_meta.len();
    let mtime_same = within_tolerance(source.mtime, dest_mtime);

    if size_same && mtime_same {
        Classification::new(Action::Skip, "same size+mtime")
    } else {
        Classification::new(
            Action::Update,
            format!(
                "size {}, mtime {}",
                if size_same { "=" } else { "≠" },
                if mtime_same { "=" } else { "≠" }
            ),
        )
    }
}

/// Issue recorded when the source side of a file cannot be read.
pub fn source_stat_issue(path: &Path, err: io::Error) -> EntryIssue {
    MirrorError::Stat {
        path: path.to_path_buf(),
        source: err,
    }
    .to_issue()
}

/// Issue for a symlink that cannot be mirrored as a regular file.
pub fn unsupported_link_issue(path: &Path) -> EntryIssue {
    EntryIssue::new(
        IssueKind::Stat,
        format!(
            "{}: symlink target is not a regular file",
            path.display()
        ),
    )
}
