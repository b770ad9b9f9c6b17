//! Resolution of the `FILE` argument into concrete target files.
//!
//! A plain path names one file. A pattern containing glob metacharacters is
//! split into a literal directory prefix, which becomes the walk root, and the
//! remaining components, which are matched with `globset` while walking.

use crate::backup::function_path;
use crate::backup::log_sink::LOG_FILE_NAME;
use crate::backup::naming::looks_like_backup;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use function_name::named;
use globset::{GlobBuilder, GlobMatcher};
use itertools::Itertools;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// An existing file is taken literally even if its name holds glob
/// metacharacters, so `report[1].txt` names itself.
#[named]
pub fn resolve_targets(pattern: &str) -> Result<Vec<PathBuf>> {
    if !is_glob_pattern(pattern) || Path::new(pattern).is_file() {
        return resolve_single(Path::new(pattern)).map(|p| vec![p]);
    }

    let (root, depth) = split_pattern(pattern);
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(Error::from)
        .with_msg(format!("Invalid glob pattern {:?}", pattern))?;
    tracing::debug!("Scanning {:?} to depth {} for {:?}", root, depth, pattern);

    let targets = walk_matches(&root, depth, &matcher)
        .with_debug_object_and_fn_name(pattern.to_string(), function_path!())?;
    if targets.is_empty() {
        return Err(Error::NoFilesMatched(pattern.to_string()));
    }
    Ok(targets)
}

fn resolve_single(path: &Path) -> Result<PathBuf> {
    match path.try_exists() {
        Ok(true) if path.is_file() => Ok(path.to_path_buf()),
        Ok(true) => Err(Error::NotAFile(path.to_path_buf())),
        Ok(false) => Err(Error::TargetNotFound(path.to_path_buf())),
        Err(e) => Err(Error::from(e).with_msg(format!("Can't access {:?}", path))),
    }
}

/// Literal directory prefix of `pattern` and the number of components after it.
fn split_pattern(pattern: &str) -> (PathBuf, usize) {
    let mut root = PathBuf::new();
    let mut components = Path::new(pattern).components().peekable();

    while let Some(c) = components.peek() {
        let literal = match c {
            Component::Normal(s) => !s.to_string_lossy().contains(GLOB_META),
            _ => true,
        };
        if !literal {
            break;
        }
        root.push(c.as_os_str());
        components.next();
    }

    (root, components.count())
}

fn walk_matches(root: &Path, depth: usize, matcher: &GlobMatcher) -> Result<Vec<PathBuf>> {
    let walk_root = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        root
    };

    let mut targets = Vec::new();
    for entry in WalkDir::new(walk_root)
        .min_depth(1)
        .max_depth(depth)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", walk_root, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        // Paths under "." are matched the way the user wrote the pattern.
        let path = if root.as_os_str().is_empty() {
            entry.path().strip_prefix(walk_root).unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if !matcher.is_match(path) {
            tracing::trace!("Skipping {:?}, glob not match", path);
            continue;
        }
        if is_own_file(path) {
            tracing::debug!("Skipping {:?}, backup or log file", path);
            continue;
        }
        targets.push(path.to_path_buf());
    }

    Ok(targets.into_iter().sorted().dedup().collect())
}

/// Backups and log files are never backed up themselves.
fn is_own_file(path: &Path) -> bool {
    looks_like_backup(path) || path.file_name().is_some_and(|n| n == LOG_FILE_NAME)
}
