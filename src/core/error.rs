//! Error taxonomy for the mirror engine.
//!
//! Only job-level and root-path errors are fatal. Everything that concerns a
//! single discovered path is turned into an [`EntryIssue`] and recorded on the
//! plan (or the apply report) so the run keeps going.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, Serializer, ser::SerializeSeq};

/// Domain errors raised by the loader, walker, classifier and applier
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Bad or missing job descriptor fields
    #[error("config error: {0}")]
    Config(String),

    /// A path that is empty, not representable, or cannot be made absolute
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The source root itself is missing or cannot be listed
    #[error("source root {} is not usable: {source}", path.display())]
    SourceRoot { path: PathBuf, source: io::Error },

    /// A directory below the source root cannot be listed
    #[error("cannot list {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },

    /// Metadata could not be read on either side
    #[error("cannot read metadata for {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    /// Read/write failure while copying one entry
    #[error("copy failed for {} ({stage}): {source}", path.display())]
    Copy {
        path: PathBuf,
        stage: CopyStage,
        source: io::Error,
    },
}

impl MirrorError {
    /// Build a per-file copy error for the given stage
    pub fn copy(path: impl Into<PathBuf>, stage: CopyStage, source: io::Error) -> Self {
        Self::Copy {
            path: path.into(),
            stage,
            source,
        }
    }

    /// Exit status this error implies when it aborts a run
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Config(_) | Self::InvalidPath { .. } => ExitStatus::InvalidJob,
            _ => ExitStatus::EntryFailures,
        }
    }

    /// Category used when the error is recorded against a single entry
    pub fn issue_kind(&self) -> IssueKind {
        match self {
            Self::Config(_) | Self::InvalidPath { .. } => IssueKind::InvalidPath,
            Self::SourceRoot { .. } | Self::Walk { .. } => IssueKind::Walk,
            Self::Stat { .. } => IssueKind::Stat,
            Self::Copy { .. } => IssueKind::Copy,
        }
    }

    /// Downgrade to a recorded, non-fatal issue
    pub fn to_issue(&self) -> EntryIssue {
        EntryIssue {
            kind: self.issue_kind(),
            message: self.to_string(),
        }
    }
}

/// Step of the copy protocol that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStage {
    CreateParent,
    RemoveStale,
    OpenSource,
    CreateTemp,
    WriteTemp,
    SetTimes,
    Rename,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CreateParent => "create parent",
            Self::RemoveStale => "remove stale temp",
            Self::OpenSource => "open source",
            Self::CreateTemp => "create temp",
            Self::WriteTemp => "write temp",
            Self::SetTimes => "set times",
            Self::Rename => "rename",
        };
        f.write_str(label)
    }
}

/// Kind of a non-fatal problem recorded against one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Walk,
    Stat,
    Copy,
    InvalidPath,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Walk => "walk",
            Self::Stat => "stat",
            Self::Copy => "copy",
            Self::InvalidPath => "invalid path",
        })
    }
}

/// A recorded warning or error attached to a plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl EntryIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Process outcome, ordered by severity (2 > 1 > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ExitStatus {
    /// Plan computed (and applied if requested) with no per-entry failures
    Success = 0,
    /// One or more walk/stat/copy failures were recorded
    EntryFailures = 1,
    /// Job descriptor invalid or unusable
    InvalidJob = 2,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Combine two outcomes keeping the worst one
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    /// Map a fatal error bubbling out of a command handler
    pub fn for_error(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<MirrorError>())
            .map(MirrorError::exit_status)
            .unwrap_or(Self::EntryFailures)
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Serialize any `Display` value as a plain string
pub(crate) fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Serialize a path as a string, replacing non-UTF-8 bytes with U+FFFD
pub(crate) fn serialize_path_lossy<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    serializer.serialize_str(&path.as_ref().to_string_lossy())
}

pub(crate) fn serialize_paths_lossy<S>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(paths.len()))?;
    for path in paths {
        seq.serialize_element(&path.to_string_lossy())?;
    }
    seq.end()
}
