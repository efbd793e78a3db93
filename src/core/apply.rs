//! Executes the ADD/UPDATE entries of a finished plan.
//!
//! Each file goes through the same protocol: parent dirs, a hidden
//! `.<name>.nmirror.part` sibling, streamed copy, fsync, timestamps, rename
//! over the final name. A failing file is recorded and the run moves on.
//!
//! Only that exact temp name is ever removed as stale, and only when no
//! source file of the plan carries the same relative path.

use std::{
    collections::HashSet,
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use filetime::{FileTime, set_file_handle_times};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::{
    error::{CopyStage, MirrorError, serialize_display, serialize_path_lossy, serialize_paths_lossy},
    plan::{Plan, PlanEntry},
};
use crate::infra::{
    config::JobDescriptor,
    paths::{PART_SUFFIX, join_relative, part_path},
};

/// One file that could not be copied
#[derive(Debug, Serialize)]
pub struct ApplyFailure {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub relative_path: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: MirrorError,
}

/// Outcome of one apply pass
#[derive(Debug, Default, Serialize)]
pub struct ApplyReport {
    #[serde(serialize_with = "serialize_paths_lossy")]
    pub copied: Vec<PathBuf>,
    pub failures: Vec<ApplyFailure>,
    pub bytes_copied: u64,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copies plan entries from the job's source root into its destination root
pub struct Applier<'a> {
    job: &'a JobDescriptor,
}

impl<'a> Applier<'a> {
    pub fn new(job: &'a JobDescriptor) -> Self {
        Self { job }
    }

    pub fn apply(&self, plan: &Plan) -> ApplyReport {
        self.apply_with_progress(plan, |_| {})
    }

    /// Copy every actionable entry in plan order. `on_entry` fires after
    /// each attempt, success or not.
    #[instrument(skip_all, fields(dest = %self.job.dest_root.display()))]
    pub fn apply_with_progress<F>(&self, plan: &Plan, mut on_entry: F) -> ApplyReport
    where
        F: FnMut(&PlanEntry),
    {
        let mut report = ApplyReport::default();
        let planned: HashSet<&Path> = plan
            .entries()
            .iter()
            .map(|e| e.relative_path.as_path())
            .collect();

        for entry in plan.actionable() {
            match self.copy_entry(&entry.relative_path, &planned) {
                Ok(bytes) => {
                    debug!(path = %entry.relative_path.display(), bytes, action = %entry.action, "copied");
                    report.bytes_copied += bytes;
                    report.copied.push(entry.relative_path.clone());
                }
                Err(error) => {
                    warn!("{error}");
                    report.failures.push(ApplyFailure {
                        relative_path: entry.relative_path.clone(),
                        error,
                    });
                }
            }
            on_entry(entry);
        }

        info!(
            copied = report.copied.len(),
            failed = report.failures.len(),
            bytes = report.bytes_copied,
            "apply finished"
        );
        report
    }

    fn copy_entry(&self, relative_path: &Path, planned: &HashSet<&Path>) -> Result<u64, MirrorError> {
        let src = join_relative(&self.job.source_root, relative_path)?;
        let dst = join_relative(&self.job.dest_root, relative_path)?;
        let temp = match part_path(relative_path) {
            Some(part) if planned.contains(part.as_path()) => {
                debug!(path = %part.display(), "temp name is a mirrored file; using a random one");
                TempName::Random
            }
            _ => TempName::Fixed,
        };
        copy_with(&src, &dst, temp)
    }
}

/// How the in-flight sibling of a destination file is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempName {
    /// `.<name>.nmirror.part`; a leftover from an interrupted run is removed
    Fixed,
    /// `.<name>.<random>.nmirror.part`; nothing existing is touched
    Random,
}

/// Copy `src` onto `dst` through a `.<name>.nmirror.part` sibling. On error
/// the temp file is dropped (and thereby removed) and `dst` is left untouched.
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<u64, MirrorError> {
    copy_with(src, dst, TempName::Fixed)
}

fn copy_with(src: &Path, dst: &Path, temp: TempName) -> Result<u64, MirrorError> {
    let (Some(parent), Some(file_name), Some(part)) = (dst.parent(), dst.file_name(), part_path(dst))
    else {
        return Err(MirrorError::InvalidPath {
            path: dst.display().to_string(),
            reason: "destination has no file name".into(),
        });
    };

    fs::create_dir_all(parent).map_err(fail(dst, CopyStage::CreateParent))?;

    // Leftover from an interrupted run.
    if temp == TempName::Fixed {
        match fs::remove_file(&part) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(fail(dst, CopyStage::RemoveStale)(e));
            }
            _ => {}
        }
    }

    let mut source = File::open(src).map_err(fail(dst, CopyStage::OpenSource))?;
    let src_meta = source.metadata().map_err(fail(dst, CopyStage::OpenSource))?;

    let mut prefix = OsString::from(".");
    prefix.push(file_name);
    let rand_bytes = match temp {
        TempName::Fixed => 0,
        TempName::Random => {
            prefix.push(".");
            6
        }
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(PART_SUFFIX).rand_bytes(rand_bytes);
    #[cfg(unix)]
    builder.permissions(src_meta.permissions());
    let mut tmp = builder
        .tempfile_in(parent)
        .map_err(fail(dst, CopyStage::CreateTemp))?;

    let bytes = io::copy(&mut source, tmp.as_file_mut()).map_err(fail(dst, CopyStage::WriteTemp))?;
    tmp.as_file()
        .sync_all()
        .map_err(fail(dst, CopyStage::WriteTemp))?;

    let mtime = FileTime::from_last_modification_time(&src_meta);
    let atime = FileTime::from_last_access_time(&src_meta);
    set_file_handle_times(tmp.as_file(), Some(atime), Some(mtime))
        .map_err(fail(dst, CopyStage::SetTimes))?;

    tmp.persist(dst)
        .map_err(|e| fail(dst, CopyStage::Rename)(e.error))?;

    #[cfg(unix)]
    if let Err(e) = sync_dir(parent) {
        debug!(dir = %parent.display(), "directory fsync skipped: {e}");
    }

    Ok(bytes)
}

fn fail(dst: &Path, stage: CopyStage) -> impl FnOnce(io::Error) -> MirrorError + '_ {
    move |e| MirrorError::copy(dst, stage, e)
}

#[cfg(unix)]
fn sync_dir(p: &Path) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(p)?;
    f.sync_all()
}
