//! Filepath: src/infra/config.rs
//! Job file loading and validation.
//! - One job per file (`.yaml`/`.yml`, `.toml` or `.json` by extension)
//! - `NETMIRROR_*` environment variables override file values
//!   (`NETMIRROR_DEST_DIR`, `NETMIRROR_EXCLUDES__ROOT_DIRS`, ...)
//! - Validated once into an immutable [`JobDescriptor`] that every engine
//!   component borrows

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        error::MirrorError,
        exclude::{ExclusionMatcher, ExclusionRules, platform_case_insensitive},
    },
    infra::paths::{display_path, is_within, normalize_root},
};

/// File name written by `nmirror init`
pub const DEFAULT_JOB_FILE: &str = "netmirror.yaml";

/// Raw job file as written by the user. Every field is optional here so a
/// missing key can be reported by name instead of as a serde error.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFile
{
    pub source_dir: Option<String>,
    pub dest_dir: Option<String>,
    pub excludes: Option<ExcludesSection>,
}

/// `excludes:` block; `null` lists are treated as empty
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludesSection
{
    pub root_dirs: Option<Vec<String>>,
    pub recursive_dirs: Option<Vec<String>>,
    pub specific_paths: Option<Vec<String>>,
    pub file_patterns: Option<Vec<String>>,
    pub case_insensitive: Option<bool>,
}

impl From<ExcludesSection> for ExclusionRules
{
    fn from(section: ExcludesSection) -> Self
    {
        Self {
            root_dirs: section
                .root_dirs
                .unwrap_or_default(),
            recursive_dirs: section
                .recursive_dirs
                .unwrap_or_default(),
            specific_paths: section
                .specific_paths
                .unwrap_or_default(),
            file_patterns: section
                .file_patterns
                .unwrap_or_default(),
            case_insensitive: section
                .case_insensitive
                .unwrap_or_else(platform_case_insensitive),
        }
    }
}

/// Validated, immutable description of one sync task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor
{
    /// Absolute, long-path-safe source root
    pub source_root: PathBuf,

    /// Absolute, long-path-safe destination root
    pub dest_root: PathBuf,

    pub excludes: ExclusionRules,
}

impl JobDescriptor
{
    /// Normalize both roots and check the exclusion rules compile.
    pub fn new(
        source_dir: &str,
        dest_dir: &str,
        excludes: ExclusionRules,
    ) -> Result<Self, MirrorError>
    {
        let source_root = normalize_root(source_dir)?;
        let dest_root = normalize_root(dest_dir)?;

        if is_within(&dest_root, &source_root)
        {
            return Err(MirrorError::Config(format!(
                "dest_dir {} must not be the source_dir or lie inside it",
                display_path(&dest_root).display()
            )));
        }

        ExclusionMatcher::new(&excludes)?;

        Ok(Self { source_root, dest_root, excludes })
    }
}

impl TryFrom<JobFile> for JobDescriptor
{
    type Error = MirrorError;

    fn try_from(file: JobFile) -> Result<Self, MirrorError>
    {
        let source = required(file.source_dir, "source_dir")?;
        let dest = required(file.dest_dir, "dest_dir")?;
        let excludes = file
            .excludes
            .unwrap_or_default()
            .into();
        Self::new(&source, &dest, excludes)
    }
}

fn required(
    value: Option<String>,
    key: &str,
) -> Result<String, MirrorError>
{
    value
        .filter(|v| {
            !v.trim()
                .is_empty()
        })
        .ok_or_else(|| MirrorError::Config(format!("missing required key: {key}")))
}

/// Load and validate one job file (plus environment overrides).
pub fn load_job(path: &Path) -> Result<JobDescriptor, MirrorError>
{
    let cfg = config::Config::builder()
        .add_source(config::File::from(path).required(true))
        .add_source(
            config::Environment::with_prefix("NETMIRROR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("excludes.root_dirs")
                .with_list_parse_key("excludes.recursive_dirs")
                .with_list_parse_key("excludes.specific_paths")
                .with_list_parse_key("excludes.file_patterns"),
        )
        .build()
        .map_err(|e| MirrorError::Config(format!("{}: {e}", path.display())))?;

    let raw: JobFile = cfg
        .try_deserialize()
        .map_err(|e| MirrorError::Config(format!("{}: {e}", path.display())))?;

    let job = JobDescriptor::try_from(raw)?;
    debug!(
        source = %job.source_root.display(),
        dest = %job.dest_root.display(),
        "job loaded"
    );
    Ok(job)
}

const TEMPLATE: &str = r#"# netmirror job file: one-way, no-delete mirror of source_dir into dest_dir.
# Paths may use ~ and $VARS. UNC shares work on Windows (\\server\share\app).
source_dir: /mnt/share/app
dest_dir: ~/mirror/app

excludes:
  # Directory names excluded only directly under source_dir
  root_dirs:
    - logs
  # Directory names excluded at any depth
  recursive_dirs:
    - node_modules
    - __pycache__
    - .git
  # Paths relative to source_dir; the path and everything below it
  specific_paths:
    - scripts/output
  # Globs (* and ?) matched against file names only
  file_patterns:
    - "*.tmp"
    - "~$*"
    - Thumbs.db
  # Uncomment to force name matching case (defaults to the platform)
  # case_insensitive: true
"#;

/// Write a commented job template into `args.path`.
pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let job_path = args
        .path
        .join(DEFAULT_JOB_FILE);

    if job_path.exists() && !args.force
    {
        anyhow::bail!("Job file already exists at {}. Use --force to overwrite.", job_path.display());
    }

    std::fs::create_dir_all(&args.path).context("Failed to create target directory")?;
    std::fs::write(&job_path, TEMPLATE).context("Failed to write job file")?;

    if !ctx.quiet
    {
        println!("Created job file at {}", job_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_job(
        dir: &Path,
        name: &str,
        body: &str,
    ) -> PathBuf
    {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_yaml_with_null_lists()
    {
        let tmp = TempDir::new().unwrap();
        let path = write_job(
            tmp.path(),
            "job.yaml",
            "source_dir: /srv/app\ndest_dir: /tmp/mirror\nexcludes:\n  root_dirs:\n  recursive_dirs: [node_modules]\n  case_insensitive: false\n",
        );

        let job = load_job(&path).unwrap();

        assert!(job.source_root.is_absolute());
        assert!(job.excludes.root_dirs.is_empty());
        assert_eq!(job.excludes.recursive_dirs, vec!["node_modules".to_string()]);
        assert!(!job.excludes.case_insensitive);
    }

    #[test]
    fn missing_or_blank_roots_are_config_errors()
    {
        let tmp = TempDir::new().unwrap();
        let no_dest = write_job(tmp.path(), "a.yaml", "source_dir: /srv/app\n");
        let blank = write_job(tmp.path(), "b.yaml", "source_dir: '  '\ndest_dir: /tmp/x\n");

        let err = load_job(&no_dest).unwrap_err();
        assert!(err.to_string().contains("dest_dir"), "{err}");
        assert!(matches!(load_job(&blank), Err(MirrorError::Config(_))));
    }

    #[test]
    fn unreadable_job_file_is_config_error()
    {
        let tmp = TempDir::new().unwrap();
        let err = load_job(&tmp.path().join("absent.yaml")).unwrap_err();
        assert_eq!(err.exit_status(), crate::core::error::ExitStatus::InvalidJob);
    }

    #[test]
    fn dest_inside_source_is_rejected()
    {
        let err = JobDescriptor::new("/srv/app", "/srv/app/mirror", ExclusionRules::default()).unwrap_err();
        assert!(matches!(err, MirrorError::Config(_)), "{err}");
        assert!(JobDescriptor::new("/srv/app", "/srv/app", ExclusionRules::default()).is_err());
        assert!(JobDescriptor::new("/srv/app", "/srv/app2", ExclusionRules::default()).is_ok());
    }

    #[test]
    fn dest_reaching_into_source_through_dotdot_is_rejected()
    {
        let sneaky = JobDescriptor::new("/srv/app", "/srv/app/../app/x", ExclusionRules::default());
        assert!(matches!(sneaky, Err(MirrorError::Config(_))), "{sneaky:?}");

        let sibling = JobDescriptor::new("/srv/app", "/srv/app/../mirror", ExclusionRules::default());
        assert!(sibling.is_ok(), "{sibling:?}");
    }

    #[test]
    fn bad_pattern_fails_validation()
    {
        let tmp = TempDir::new().unwrap();
        let path = write_job(
            tmp.path(),
            "job.json",
            r#"{"source_dir": "/a", "dest_dir": "/b", "excludes": {"file_patterns": ["[oops"]}}"#,
        );
        assert!(matches!(load_job(&path), Err(MirrorError::Config(_))));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force()
    {
        let tmp = TempDir::new().unwrap();
        let ctx = AppContext { quiet: true, no_color: true, verbose: 0 };
        let args = || InitArgs { path: tmp.path().to_path_buf(), force: false };

        init(args(), &ctx).unwrap();
        assert!(init(args(), &ctx).is_err());
        init(InitArgs { force: true, ..args() }, &ctx).unwrap();

        // The template itself must be a loadable job.
        let job = load_job(&tmp.path().join(DEFAULT_JOB_FILE)).unwrap();
        assert_eq!(job.excludes.root_dirs, vec!["logs".to_string()]);
    }
}
