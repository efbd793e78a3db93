//! The sync plan: one fully materialised list of classified entries built
//! from a single walk, before any write happens.
//!
//! Dry-run and apply share exactly this planning step; the applier only ever
//! consumes a finished [`Plan`]. Plans are never cached across runs.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::{debug, instrument, trace, warn};

use crate::core::{
    classify::{SourceMeta, classify, source_stat_issue, unsupported_link_issue},
    error::{EntryIssue, MirrorError, serialize_path_lossy},
    exclude::ExclusionMatcher,
};
use crate::infra::{
    config::JobDescriptor,
    walk::{SourceWalker, WalkEntry, WalkEvent},
};

/// Disposition assigned to a discovered path. There is deliberately no
/// delete action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Add,
    Update,
    Skip,
    Exclude,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Add, Action::Update, Action::Skip, Action::Exclude];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Skip => "SKIP",
            Self::Exclude => "EXCLUDE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One classified filesystem object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub relative_path: PathBuf,
    pub kind: EntryKind,
    pub action: Action,
    pub source_size: Option<u64>,
    #[serde(serialize_with = "serialize_mtime")]
    pub source_mtime: Option<SystemTime>,
    /// Short human-readable explanation of the decision
    pub reason: String,
    pub issue: Option<EntryIssue>,
}

impl PlanEntry {
    /// Only files with ADD or UPDATE are ever handed to the applier
    pub fn is_actionable(&self) -> bool {
        self.kind == EntryKind::File && matches!(self.action, Action::Add | Action::Update)
    }

    fn excluded(entry: &WalkEntry, reason: &str, meta: Option<SourceMeta>) -> Self {
        Self {
            relative_path: entry.relative_path.clone(),
            kind: entry.kind,
            action: Action::Exclude,
            source_size: meta.map(|m| m.size),
            source_mtime: meta.map(|m| m.mtime),
            reason: reason.to_string(),
            issue: None,
        }
    }

    fn with_issue(mut self, issue: EntryIssue) -> Self {
        self.issue = Some(issue);
        self
    }
}

fn serialize_mtime<S: Serializer>(mtime: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
    match mtime {
        Some(t) => s.serialize_some(&DateTime::<Utc>::from(*t).to_rfc3339()),
        None => s.serialize_none(),
    }
}

/// Per-action tallies plus the number of recorded issues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub add: usize,
    pub update: usize,
    pub skip: usize,
    pub exclude: usize,
    pub errors: usize,
    pub total: usize,
}

impl ActionCounts {
    pub fn get(&self, action: Action) -> usize {
        match action {
            Action::Add => self.add,
            Action::Update => self.update,
            Action::Skip => self.skip,
            Action::Exclude => self.exclude,
        }
    }
}

/// Ordered result of one full walk
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    #[serde(serialize_with = "serialize_path_lossy")]
    source_root: PathBuf,
    #[serde(serialize_with = "serialize_path_lossy")]
    dest_root: PathBuf,
    entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn from_entries(source_root: PathBuf, dest_root: PathBuf, entries: Vec<PlanEntry>) -> Self {
        Self {
            source_root,
            dest_root,
            entries,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Entries the applier will copy, in plan order
    pub fn actionable(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.is_actionable())
    }

    pub fn with_action(&self, action: Action) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |e| e.action == action)
    }

    /// Look up the action recorded for a relative path
    pub fn action_for(&self, relative_path: impl AsRef<Path>) -> Option<Action> {
        let wanted = relative_path.as_ref();
        self.entries
            .iter()
            .find(|e| e.relative_path == wanted)
            .map(|e| e.action)
    }

    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for e in &self.entries {
            match e.action {
                Action::Add => counts.add += 1,
                Action::Update => counts.update += 1,
                Action::Skip => counts.skip += 1,
                Action::Exclude => counts.exclude += 1,
            }
            if e.issue.is_some() {
                counts.errors += 1;
            }
        }
        counts.total = self.entries.len();
        counts
    }

    pub fn has_issues(&self) -> bool {
        self.entries.iter().any(|e| e.issue.is_some())
    }
}

/// Walks the source root of one job and classifies what it finds
pub struct Planner<'a> {
    job: &'a JobDescriptor,
    matcher: ExclusionMatcher,
}

impl<'a> Planner<'a> {
    pub fn new(job: &'a JobDescriptor) -> Result<Self, MirrorError> {
        Ok(Self {
            job,
            matcher: ExclusionMatcher::new(&job.excludes)?,
        })
    }

    /// Build a fresh plan. Only a missing or unlistable source root is fatal;
    /// every per-entry problem is recorded on its entry.
    #[instrument(skip(self), fields(source = %self.job.source_root.display()))]
    pub fn plan(&self) -> Result<Plan, MirrorError> {
        let root = &self.job.source_root;
        let meta = fs::metadata(root).map_err(|source| MirrorError::SourceRoot {
            path: root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(MirrorError::SourceRoot {
                path: root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "source root is not a directory",
                ),
            });
        }

        let walker = SourceWalker::new(root, &self.matcher);
        let mut entries = Vec::new();
        for event in walker.walk() {
            if let Some(entry) = self.plan_event(event)? {
                entries.push(entry);
            }
        }

        let plan = Plan::from_entries(root.clone(), self.job.dest_root.clone(), entries);
        let counts = plan.counts();
        debug!(
            add = counts.add,
            update = counts.update,
            skip = counts.skip,
            exclude = counts.exclude,
            errors = counts.errors,
            "plan ready"
        );
        Ok(plan)
    }

    /// Turn one walk event into at most one plan entry. A failure on the
    /// source root itself (empty relative path) aborts the plan.
    fn plan_event(&self, event: WalkEvent) -> Result<Option<PlanEntry>, MirrorError> {
        match event {
            WalkEvent::Entry(entry) if entry.kind == EntryKind::Directory => {
                trace!(dir = %entry.relative_path.display(), "descending");
                Ok(None)
            }
            WalkEvent::Entry(entry) => Ok(Some(self.plan_file(&entry))),
            WalkEvent::Excluded { entry, rule } => {
                debug!(path = %entry.relative_path.display(), rule = rule.as_str(), "excluded");
                let meta = match entry.kind {
                    EntryKind::File => fs::symlink_metadata(&entry.path)
                        .ok()
                        .and_then(|m| SourceMeta::from_metadata(&m).ok()),
                    EntryKind::Directory => None,
                };
                Ok(Some(PlanEntry::excluded(&entry, rule.as_str(), meta)))
            }
            WalkEvent::Failed {
                relative_path,
                error,
                ..
            } => {
                if relative_path.as_os_str().is_empty() {
                    return Err(MirrorError::SourceRoot {
                        path: self.job.source_root.clone(),
                        source: std::io::Error::other(error.to_string()),
                    });
                }
                warn!("{error}");
                Ok(Some(PlanEntry {
                    relative_path,
                    kind: EntryKind::Directory,
                    action: Action::Exclude,
                    source_size: None,
                    source_mtime: None,
                    reason: "unreadable".into(),
                    issue: Some(error.to_issue()),
                }))
            }
        }
    }

    fn plan_file(&self, entry: &WalkEntry) -> PlanEntry {
        // Symlinks are leaves: classify by what they point at, never descend.
        let stat = if entry.is_symlink {
            fs::metadata(&entry.path)
        } else {
            fs::symlink_metadata(&entry.path)
        };

        let meta = match stat {
            Ok(m) if entry.is_symlink && !m.is_file() => {
                return PlanEntry::excluded(entry, "unsupported link", None)
                    .with_issue(unsupported_link_issue(&entry.path));
            }
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path.display(), "source unreadable: {e}");
                return PlanEntry::excluded(entry, "unreadable", None)
                    .with_issue(source_stat_issue(&entry.path, e));
            }
        };

        let source = match SourceMeta::from_metadata(&meta) {
            Ok(s) => s,
            Err(e) => {
                return PlanEntry::excluded(entry, "unreadable", None)
                    .with_issue(source_stat_issue(&entry.path, e));
            }
        };

        let verdict = classify(&entry.relative_path, &source, &self.job.dest_root);
        if let Some(issue) = &verdict.issue {
            warn!(path = %entry.relative_path.display(), "{}", issue.message);
        }

        PlanEntry {
            relative_path: entry.relative_path.clone(),
            kind: EntryKind::File,
            action: verdict.action,
            source_size: Some(source.size),
            source_mtime: Some(source.mtime),
            reason: verdict.reason,
            issue: verdict.issue,
        }
    }
}
