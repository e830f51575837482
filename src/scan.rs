//! Bicep source discovery.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];

/// Every `.bicep` file below `root`, sorted by path.
///
/// Ignored directories and anything inside `excluded` (typically the output
/// directory) are skipped. Symbolic links are not followed.
pub fn scan_bicep_files(root: &Path, excluded: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_pruned(entry, excluded));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && is_bicep_file(entry.file_name()) {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    debug!(root = %root.display(), count = files.len(), "Scanned for Bicep sources");
    Ok(files)
}

fn is_pruned(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    let ignored_dir = entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| IGNORED_DIRS.contains(&name));
    ignored_dir || excluded.iter().any(|path| entry.path().starts_with(path))
}

fn is_bicep_file(name: &OsStr) -> bool {
    name.to_string_lossy().to_lowercase().ends_with(".bicep")
}
