//! Filepath: src/infra/walk.rs
//! Lazy depth-first walker over the source root.
//! - Directories are yielded before their contents, siblings sorted by name
//! - The exclusion matcher is consulted *before* descending: an excluded
//!   directory is yielded once and its subtree is never listed
//! - Symbolic links are never followed; they come back as leaf files
//! - A directory that cannot be listed becomes a `Failed` event and the walk
//!   carries on with its siblings
//!
//! Same shape as a sorted, stack-based file-list walker: each directory is
//! listed once, its names sorted, and the pending names kept on a stack so
//! siblings resume after a subtree finishes. The matcher runs before
//! `read_dir`, so a pruned directory is never even opened.

use std::{
    ffi::OsString,
    fs::{self, FileType},
    io,
    path::{Path, PathBuf},
};

use crate::core::{
    error::MirrorError,
    exclude::{ExclusionMatcher, ExclusionRule},
    plan::EntryKind,
};

/// One discovered filesystem object below the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry
{
    /// Path relative to the source root
    pub relative_path: PathBuf,

    /// Absolute (long-path-safe) source path
    pub path: PathBuf,

    /// File or directory; symlinks are always `File`
    pub kind: EntryKind,

    /// 0 for direct children of the source root
    pub depth: usize,

    /// Entry is a symbolic link (not followed)
    pub is_symlink: bool,
}

/// What the walker reports for each visited path
#[derive(Debug)]
pub enum WalkEvent
{
    /// Included file or directory
    Entry(WalkEntry),

    /// Matched an exclusion rule; directories are pruned
    Excluded
    {
        entry: WalkEntry,
        rule: ExclusionRule,
    },

    /// Directory could not be listed (subtree skipped). An empty relative
    /// path means the source root itself failed.
    Failed
    {
        relative_path: PathBuf,
        depth: usize,
        error: MirrorError,
    },
}

/// Walker bound to one source root and one matcher
pub struct SourceWalker<'a>
{
    root: PathBuf,
    matcher: &'a ExclusionMatcher,
}

impl<'a> SourceWalker<'a>
{
    pub fn new(
        root: &Path,
        matcher: &'a ExclusionMatcher,
    ) -> Self
    {
        Self { root: root.to_path_buf(), matcher }
    }

    /// Start a fresh traversal. Each call re-lists the tree from scratch.
    pub fn walk(&self) -> Walk<'a>
    {
        Walk { root: self.root.clone(), matcher: self.matcher, stack: Vec::new(), started: false }
    }
}

/// Sorted names of one listed directory, stored reversed so `pop` yields
/// them in ascending order.
struct Listing
{
    /// Relative path of the listed directory
    relative_dir: PathBuf,

    /// Depth of the children in this listing
    depth: usize,

    pending: Vec<(OsString, FileType)>,
}

/// Iterator returned by [`SourceWalker::walk`]
pub struct Walk<'a>
{
    root: PathBuf,
    matcher: &'a ExclusionMatcher,
    stack: Vec<Listing>,
    started: bool,
}

impl Walk<'_>
{
    /// Read and sort one directory.
    fn list(
        &self,
        relative_dir: &Path,
        depth: usize,
    ) -> io::Result<Listing>
    {
        let dir = self
            .root
            .join(relative_dir);

        let mut pending = Vec::new();
        for item in fs::read_dir(&dir)?
        {
            let item = item?;
            pending.push((item.file_name(), item.file_type()?));
        }

        // Deterministic order, reversed for pop().
        pending.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(Listing { relative_dir: relative_dir.to_path_buf(), depth, pending })
    }

    fn failed(
        &self,
        relative_path: PathBuf,
        depth: usize,
        err: io::Error,
    ) -> WalkEvent
    {
        let path = self
            .root
            .join(&relative_path);
        WalkEvent::Failed {
            relative_path,
            depth,
            error: MirrorError::Walk { path, message: err.to_string() },
        }
    }

    fn visit(
        &mut self,
        entry: WalkEntry,
    ) -> WalkEvent
    {
        if let Some(rule) = self
            .matcher
            .matching_rule(&entry.relative_path, entry.kind, entry.depth)
        {
            return WalkEvent::Excluded { entry, rule };
        }

        if entry.kind == EntryKind::Directory
        {
            match self.list(&entry.relative_path, entry.depth + 1)
            {
                Ok(listing) => self
                    .stack
                    .push(listing),
                Err(err) => return self.failed(entry.relative_path, entry.depth, err),
            }
        }

        WalkEvent::Entry(entry)
    }
}

impl Iterator for Walk<'_>
{
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent>
    {
        if !self.started
        {
            self.started = true;
            match self.list(Path::new(""), 0)
            {
                Ok(listing) => self
                    .stack
                    .push(listing),
                Err(err) => return Some(self.failed(PathBuf::new(), 0, err)),
            }
        }

        loop
        {
            let top = self
                .stack
                .last_mut()?;

            let Some((name, file_type)) = top
                .pending
                .pop()
            else
            {
                // Subtree finished; resume with the parent's siblings.
                self.stack
                    .pop();
                continue;
            };

            let relative_path = top
                .relative_dir
                .join(&name);
            let depth = top.depth;
            let kind = if file_type.is_dir() { EntryKind::Directory } else { EntryKind::File };

            let entry = WalkEntry {
                path: self
                    .root
                    .join(&relative_path),
                relative_path,
                kind,
                depth,
                is_symlink: file_type.is_symlink(),
            };

            return Some(self.visit(entry));
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::core::exclude::ExclusionRules;

    /// Create a file with parent dirs as needed
    fn write_file(
        root: &Path,
        rel: &str,
        contents: &str,
    ) -> Result<()>
    {
        let path = root.join(rel);
        if let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn matcher(rules: ExclusionRules) -> ExclusionMatcher
    {
        ExclusionMatcher::new(&rules).unwrap()
    }

    /// Flatten events into `(relative path, tag)` pairs
    fn summarize(events: impl Iterator<Item = WalkEvent>) -> Vec<(String, &'static str)>
    {
        events
            .map(|ev| match ev
            {
                WalkEvent::Entry(e) => (
                    e.relative_path
                        .to_string_lossy()
                        .replace('\\', "/"),
                    if e.kind == EntryKind::Directory { "dir" } else { "file" },
                ),
                WalkEvent::Excluded { entry, .. } => (
                    entry
                        .relative_path
                        .to_string_lossy()
                        .replace('\\', "/"),
                    "excluded",
                ),
                WalkEvent::Failed { relative_path, .. } => (
                    relative_path
                        .to_string_lossy()
                        .replace('\\', "/"),
                    "failed",
                ),
            })
            .collect()
    }

    #[test]
    fn test_directories_precede_their_contents() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "b.txt", "b")?;
        write_file(root, "a/inner.txt", "i")?;
        write_file(root, "a/deeper/x.txt", "x")?;

        let m = matcher(ExclusionRules::default());
        let seen = summarize(
            SourceWalker::new(root, &m)
                .walk(),
        );

        assert_eq!(
            seen,
            vec![
                ("a".to_string(), "dir"),
                ("a/deeper".to_string(), "dir"),
                ("a/deeper/x.txt".to_string(), "file"),
                ("a/inner.txt".to_string(), "file"),
                ("b.txt".to_string(), "file"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_excluded_directory_is_yielded_once_and_pruned() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "node_modules/pkg/index.js", "js")?;
        write_file(root, "src/lib.rs", "pub fn x() {}")?;

        let m = matcher(ExclusionRules {
            recursive_dirs: vec!["node_modules".into()],
            ..ExclusionRules::default()
        });
        let seen = summarize(
            SourceWalker::new(root, &m)
                .walk(),
        );

        assert_eq!(
            seen,
            vec![
                ("node_modules".to_string(), "excluded"),
                ("src".to_string(), "dir"),
                ("src/lib.rs".to_string(), "file"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_depth_counts_from_root_children() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "one/two/three.txt", "3")?;

        let m = matcher(ExclusionRules::default());
        let depths: Vec<usize> = SourceWalker::new(root, &m)
            .walk()
            .filter_map(|ev| match ev
            {
                WalkEvent::Entry(e) => Some(e.depth),
                _ => None,
            })
            .collect();

        assert_eq!(depths, vec![0, 1, 2]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_leaves() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "real/file.txt", "f")?;

        // A link back to the root would loop forever if followed.
        std::os::unix::fs::symlink(root, root.join("loop"))?;

        let m = matcher(ExclusionRules::default());
        let events: Vec<WalkEvent> = SourceWalker::new(root, &m)
            .walk()
            .collect();

        let link = events
            .iter()
            .find_map(|ev| match ev
            {
                WalkEvent::Entry(e) if e.relative_path == Path::new("loop") => Some(e),
                _ => None,
            })
            .expect("symlink yielded");
        assert!(link.is_symlink);
        assert_eq!(link.kind, EntryKind::File);
        assert_eq!(events.len(), 3, "unexpected events: {events:?}");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_directory_is_reported_and_walk_continues() -> Result<()>
    {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores permission bits; nothing to observe there.
        if unsafe { libc::geteuid() } == 0
        {
            return Ok(());
        }

        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "locked/secret.txt", "s")?;
        write_file(root, "open/ok.txt", "o")?;
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000))?;

        let m = matcher(ExclusionRules::default());
        let seen = summarize(
            SourceWalker::new(root, &m)
                .walk(),
        );

        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755))?;

        assert!(seen.contains(&("locked".to_string(), "failed")), "{seen:?}");
        assert!(seen.contains(&("open/ok.txt".to_string(), "file")), "{seen:?}");
        assert!(
            !seen
                .iter()
                .any(|(p, _)| p == "locked/secret.txt")
        );
        Ok(())
    }

    #[test]
    fn test_root_that_is_a_file_fails_with_empty_path() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp
            .path()
            .join("plain.txt");
        fs::write(&root, "not a directory")?;

        let m = matcher(ExclusionRules::default());
        let events: Vec<_> = SourceWalker::new(&root, &m)
            .walk()
            .collect();

        assert_eq!(events.len(), 1, "{events:?}");
        match &events[0]
        {
            WalkEvent::Failed { relative_path, depth, error } =>
            {
                assert!(
                    relative_path
                        .as_os_str()
                        .is_empty()
                );
                assert_eq!(*depth, 0);
                assert!(matches!(error, MirrorError::Walk { .. }), "{error}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_directory_removed_mid_walk_is_reported_and_walk_continues() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "a.txt", "a")?;
        write_file(root, "gone/inner.txt", "i")?;
        write_file(root, "z.txt", "z")?;

        let m = matcher(ExclusionRules::default());
        let mut walk = SourceWalker::new(root, &m).walk();

        // The root listing is taken on the first step; `gone` is opened later.
        let first = summarize(walk.by_ref().take(1));
        assert_eq!(first, vec![("a.txt".to_string(), "file")]);
        fs::remove_dir_all(root.join("gone"))?;

        let rest = summarize(walk);
        assert_eq!(
            rest,
            vec![("gone".to_string(), "failed"), ("z.txt".to_string(), "file")]
        );
        Ok(())
    }
}
