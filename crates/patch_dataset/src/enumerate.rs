//! Glob-pattern file discovery under a dataset root.

use crate::types::{DatasetResult, PatchDatasetError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files under `root` matching `pattern` (gitignore-style, `*` never crosses
/// `/`), sorted. A missing root yields an empty list.
pub fn glob_files(root: &Path, pattern: &str) -> DatasetResult<Vec<PathBuf>> {
    if !root.is_dir() {
        debug!(root = %root.display(), pattern, "dataset root missing; nothing to enumerate");
        return Ok(Vec::new());
    }
    let walker = globwalk::GlobWalkerBuilder::from_patterns(root, &[pattern])
        .build()
        .map_err(|e| PatchDatasetError::Glob {
            root: root.to_path_buf(),
            pattern: pattern.to_string(),
            source: e,
        })?;
    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(root = %root.display(), pattern, "skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    debug!(root = %root.display(), pattern, count = files.len(), "enumerated");
    Ok(files)
}

/// Concatenate the matches of several patterns, keeping pattern order.
pub fn glob_many(root: &Path, patterns: &[&str]) -> DatasetResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        out.extend(glob_files(root, pattern)?);
    }
    Ok(out)
}
