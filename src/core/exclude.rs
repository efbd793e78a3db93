//! Exclusion rules for one job.
//!
//! Four independent rule lists, OR'd together: a path is excluded as soon as
//! any rule matches and nothing ever un-excludes it.
//!
//! - `root_dirs`: directory names, only as direct children of the source root
//! - `recursive_dirs`: directory names at any depth
//! - `specific_paths`: relative paths; the path itself and everything below it
//! - `file_patterns`: `*`/`?` globs against file base names only

use std::path::{Component, Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::core::error::MirrorError;
use crate::core::plan::EntryKind;

/// Raw exclusion lists as configured for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    pub root_dirs: Vec<String>,
    pub recursive_dirs: Vec<String>,
    pub specific_paths: Vec<String>,
    pub file_patterns: Vec<String>,
    /// Compare names case-insensitively (default follows the platform)
    pub case_insensitive: bool,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            root_dirs: Vec::new(),
            recursive_dirs: Vec::new(),
            specific_paths: Vec::new(),
            file_patterns: Vec::new(),
            case_insensitive: platform_case_insensitive(),
        }
    }
}

/// Case-insensitive on Windows and macOS, exact elsewhere
pub fn platform_case_insensitive() -> bool {
    cfg!(any(windows, target_os = "macos"))
}

/// Which rule list produced an exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    RootDir,
    RecursiveDir,
    SpecificPath,
    FilePattern,
}

impl ExclusionRule {
    /// Short reason tag shown in rendered plans
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RootDir => "root_dir",
            Self::RecursiveDir => "recursive_dir",
            Self::SpecificPath => "specific_path",
            Self::FilePattern => "pattern",
        }
    }
}

/// Compiled, immutable form of [`ExclusionRules`]
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    root_dirs: Vec<String>,
    recursive_dirs: Vec<String>,
    specific_paths: Vec<Vec<String>>,
    file_patterns: GlobSet,
    case_insensitive: bool,
}

impl ExclusionMatcher {
    /// Compile the rule set; malformed globs or unusable specific paths are
    /// configuration errors.
    pub fn new(rules: &ExclusionRules) -> Result<Self, MirrorError> {
        let ci = rules.case_insensitive;
        let fold_all = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(|n| fold(n, ci))
                .collect()
        };

        let mut specific_paths = Vec::with_capacity(rules.specific_paths.len());
        for raw in &rules.specific_paths {
            specific_paths.push(split_specific_path(raw, ci)?);
        }

        let mut globs = GlobSetBuilder::new();
        for pattern in &rules.file_patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(ci)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    MirrorError::Config(format!("invalid file pattern '{pattern}': {e}"))
                })?;
            globs.add(glob);
        }
        let file_patterns = globs
            .build()
            .map_err(|e| MirrorError::Config(format!("invalid file patterns: {e}")))?;

        Ok(Self {
            root_dirs: fold_all(&rules.root_dirs),
            recursive_dirs: fold_all(&rules.recursive_dirs),
            specific_paths,
            file_patterns,
            case_insensitive: ci,
        })
    }

    /// First rule that excludes `relative_path`, if any.
    ///
    /// `depth` is 0 for direct children of the source root.
    pub fn matching_rule(
        &self,
        relative_path: &Path,
        kind: EntryKind,
        depth: usize,
    ) -> Option<ExclusionRule> {
        let base = relative_path.file_name()?;
        let folded = fold(&base.to_string_lossy(), self.case_insensitive);

        if kind == EntryKind::Directory {
            if depth == 0 && self.root_dirs.contains(&folded) {
                return Some(ExclusionRule::RootDir);
            }
            if self.recursive_dirs.contains(&folded) {
                return Some(ExclusionRule::RecursiveDir);
            }
        }

        if self.is_under_specific(relative_path) {
            return Some(ExclusionRule::SpecificPath);
        }

        if kind == EntryKind::File && self.file_patterns.is_match(base) {
            return Some(ExclusionRule::FilePattern);
        }

        None
    }

    pub fn should_exclude(&self, relative_path: &Path, kind: EntryKind, depth: usize) -> bool {
        self.matching_rule(relative_path, kind, depth).is_some()
    }

    fn is_under_specific(&self, relative_path: &Path) -> bool {
        if self.specific_paths.is_empty() {
            return false;
        }
        let parts: Vec<String> = relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(n) => Some(fold(&n.to_string_lossy(), self.case_insensitive)),
                _ => None,
            })
            .collect();
        self.specific_paths
            .iter()
            .any(|prefix| parts.starts_with(prefix))
    }
}

fn fold(s: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

/// Split `scripts\output` or `scripts/output/` into folded components.
fn split_specific_path(raw: &str, case_insensitive: bool) -> Result<Vec<String>, MirrorError> {
    let mut parts = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part.trim() {
            "" | "." => continue,
            ".." => {
                return Err(MirrorError::Config(format!(
                    "specific path '{raw}' must not contain '..'"
                )));
            }
            p if p.ends_with(':') => {
                return Err(MirrorError::Config(format!(
                    "specific path '{raw}' must be relative to the source root"
                )));
            }
            p => parts.push(fold(p, case_insensitive)),
        }
    }
    if parts.is_empty() {
        return Err(MirrorError::Config(format!(
            "specific path '{raw}' does not name anything below the source root"
        )));
    }
    Ok(parts)
}
