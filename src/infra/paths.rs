//! Filepath: src/infra/paths.rs
//! Root path normalization.
//! - Expands `~` and `$VAR` in user-supplied roots
//! - Makes the root absolute without resolving symlinks or touching case
//! - On Windows, adds the `\\?\` / `\\?\UNC\` prefix so paths longer than
//!   260 characters stay openable
//!
//! Every other component joins relative names onto these roots, so nothing
//! downstream manipulates raw path strings for I/O.

use std::{
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

use crate::core::error::MirrorError;

#[cfg(windows)]
const VERBATIM_PREFIX: &str = r"\\?\";

#[cfg(windows)]
const VERBATIM_UNC_PREFIX: &str = r"\\?\UNC\";

/// Normalize a user-supplied root (local path or network share) into an
/// absolute, long-path-safe form.
pub fn normalize_root(raw: &str) -> Result<PathBuf, MirrorError>
{
    let trimmed = raw.trim();
    if trimmed.is_empty()
    {
        return Err(invalid(raw, "path is empty"));
    }

    let expanded = shellexpand::full(trimmed).map_err(|e| invalid(raw, &e.to_string()))?;
    let native = to_native_separators(&expanded);

    let absolute =
        std::path::absolute(&native).map_err(|e| invalid(raw, &format!("cannot be made absolute: {e}")))?;

    Ok(to_long_path(&absolute))
}

/// Add the Windows verbatim prefix; identity elsewhere.
pub fn to_long_path(path: &Path) -> PathBuf
{
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        if s.starts_with(VERBATIM_PREFIX)
        {
            return path.to_path_buf();
        }
        if let Some(share) = s.strip_prefix(r"\\")
        {
            return PathBuf::from(format!("{VERBATIM_UNC_PREFIX}{share}"));
        }
        PathBuf::from(format!("{VERBATIM_PREFIX}{s}"))
    }

    #[cfg(not(windows))]
    {
        path.to_path_buf()
    }
}

/// Strip the verbatim prefix again for human-facing output.
pub fn display_path(path: &Path) -> PathBuf
{
    #[cfg(windows)]
    {
        let s = path.to_string_lossy();
        if let Some(share) = s.strip_prefix(VERBATIM_UNC_PREFIX)
        {
            return PathBuf::from(format!(r"\\{share}"));
        }
    }

    dunce::simplified(path).to_path_buf()
}

/// Join a walker-produced relative path under `root`, one component at a
/// time. Anything other than plain names is refused so an entry can never
/// escape the root it belongs to.
pub fn join_relative(
    root: &Path,
    relative: &Path,
) -> Result<PathBuf, MirrorError>
{
    let mut out = root.to_path_buf();
    let mut pushed = false;

    for component in relative.components()
    {
        match component
        {
            Component::Normal(name) =>
            {
                out.push(name);
                pushed = true;
            }
            Component::CurDir => {}
            _ =>
            {
                return Err(invalid(
                    &relative.to_string_lossy(),
                    "relative entry must only contain plain names",
                ));
            }
        }
    }

    if !pushed
    {
        return Err(invalid(&relative.to_string_lossy(), "relative entry is empty"));
    }

    Ok(out)
}

/// Suffix shared by every in-flight temp file
pub const PART_SUFFIX: &str = ".nmirror.part";

/// Hidden sibling used while a copy is in flight: `.<name>.nmirror.part`.
pub fn part_path(dest: &Path) -> Option<PathBuf>
{
    let mut name = OsString::from(".");
    name.push(dest.file_name()?);
    name.push(PART_SUFFIX);
    Some(dest.with_file_name(name))
}

/// Lexically check whether `inner` equals or lives under `outer`.
/// `.` and `..` are folded first; links are not resolved.
pub fn is_within(
    inner: &Path,
    outer: &Path,
) -> bool
{
    lexical_components(inner).starts_with(&lexical_components(outer))
}

/// Components with `.` dropped and each `..` cancelling the name before it.
/// A `..` at the root is dropped, one with nothing to cancel is kept.
fn lexical_components(path: &Path) -> Vec<Component<'_>>
{
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components()
    {
        match component
        {
            Component::CurDir => {}
            Component::ParentDir => match out.last()
            {
                Some(Component::Normal(_)) =>
                {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(windows)]
fn to_native_separators(s: &str) -> String
{
    s.replace('/', "\\")
}

#[cfg(not(windows))]
fn to_native_separators(s: &str) -> String
{
    s.to_string()
}

fn invalid(
    path: &str,
    reason: &str,
) -> MirrorError
{
    MirrorError::InvalidPath { path: path.to_string(), reason: reason.to_string() }
}
