//! Shared test utilities for integration tests
//!
//! Source/destination fixtures with pinned mtimes, plus job helpers.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use filetime::{FileTime, set_file_mtime};
use netmirror::core::ExclusionRules;
use netmirror::infra::JobDescriptor;

/// Fixed timestamp base so size+mtime decisions are deterministic
pub const BASE: i64 = 1_700_000_000;

/// A source and a destination root living in one temp dir
pub struct Mirror
{
    pub tmp: assert_fs::TempDir,
    pub src: PathBuf,
    pub dst: PathBuf,
}

impl Mirror
{
    /// Empty source tree; the destination directory is created but empty
    pub fn new() -> Self
    {
        let tmp = assert_fs::TempDir::new().expect("tempdir");
        let src = tmp
            .child("src")
            .path()
            .to_path_buf();
        let dst = tmp
            .child("dst")
            .path()
            .to_path_buf();
        fs::create_dir_all(&src).expect("src");
        fs::create_dir_all(&dst).expect("dst");
        Self { tmp, src, dst }
    }

    pub fn job(
        &self,
        rules: ExclusionRules,
    ) -> JobDescriptor
    {
        job(&self.src, &self.dst, rules)
    }

    /// Write a YAML job file for these roots and return its path
    pub fn job_file(
        &self,
        excludes_yaml: &str,
    ) -> PathBuf
    {
        let body = format!(
            "source_dir: '{}'\ndest_dir: '{}'\n{excludes_yaml}",
            self.src.display(),
            self.dst.display()
        );
        let path = self
            .tmp
            .child("job.yaml");
        path.write_str(&body)
            .expect("job file");
        path.path()
            .to_path_buf()
    }
}

/// Exact-case rules so results do not depend on the host platform
pub fn rules() -> ExclusionRules
{
    ExclusionRules { case_insensitive: false, ..ExclusionRules::default() }
}

pub fn job(
    src: &Path,
    dst: &Path,
    rules: ExclusionRules,
) -> JobDescriptor
{
    JobDescriptor::new(
        src.to_str()
            .expect("utf-8 path"),
        dst.to_str()
            .expect("utf-8 path"),
        rules,
    )
    .expect("valid job")
}

/// Write `rel` under `root` (creating parents) and pin its mtime
pub fn write_at(
    root: &Path,
    rel: &str,
    body: &str,
    mtime_secs: i64,
)
{
    let path = root.join(rel);
    if let Some(parent) = path.parent()
    {
        fs::create_dir_all(parent).expect("parents");
    }
    fs::write(&path, body).expect("write");
    set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).expect("mtime");
}

pub fn mtime_of(path: &Path) -> i64
{
    let meta = fs::metadata(path).expect("metadata");
    FileTime::from_last_modification_time(&meta).unix_seconds()
}

/// All file paths below `root`, relative, `/`-separated and sorted
pub fn list_files(root: &Path) -> Vec<String>
{
    fn visit(
        root: &Path,
        dir: &Path,
        out: &mut Vec<String>,
    )
    {
        for entry in fs::read_dir(dir).expect("read_dir")
        {
            let path = entry
                .expect("entry")
                .path();
            if path.is_dir()
            {
                visit(root, &path, out);
            }
            else
            {
                let rel = path
                    .strip_prefix(root)
                    .expect("under root");
                out.push(
                    rel.to_string_lossy()
                        .replace('\\', "/"),
                );
            }
        }
    }

    let mut out = Vec::new();
    if root.exists()
    {
        visit(root, root, &mut out);
    }
    out.sort();
    out
}
