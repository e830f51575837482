//! File helpers for source hashing, timestamps and facts output.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::Result;

/// Extension of Bicep sources.
pub const BICEP_EXTENSION: &str = ".bicep";

/// Suffix of generated facts files.
pub const FACTS_EXTENSION: &str = ".facts.json";

/// Lowercase hex SHA-256 of the file's bytes.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let data = fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&data)))
}

/// Last-modified time as UTC RFC 3339 with milliseconds, e.g.
/// `2024-05-01T12:00:00.000Z`.
pub async fn file_mtime_iso(path: &Path) -> Result<String> {
    let modified = fs::metadata(path).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Join path components with `/` regardless of platform.
pub fn to_posix_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute form of `path` against the current directory, with `.` and `..`
/// resolved lexically.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// `target` relative to `base`, using `..` where needed. Both should be
/// absolute. When they share no root (different drives) `target` is
/// returned unchanged.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let rooted = target.has_root();
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && rooted {
        return target.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Strip a trailing `.bicep` unless nothing would be left.
pub fn strip_bicep_extension(file_name: &str) -> &str {
    match file_name.strip_suffix(BICEP_EXTENSION) {
        Some(stem) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Source file name without `.bicep`.
pub fn source_stem(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    strip_bicep_extension(&file_name).to_string()
}

/// Where the facts for `file` are written.
///
/// With an output directory the source's folder structure below `root` is
/// mirrored there; sources outside `root` land directly in it. Without one,
/// the facts sit next to the source.
pub fn facts_output_path(file: &Path, root: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = format!("{}{}", source_stem(file), FACTS_EXTENSION);

    let Some(out_dir) = out_dir else {
        return file
            .parent()
            .map_or_else(|| PathBuf::from(&file_name), |dir| dir.join(&file_name));
    };

    let relative = relative_path(root, file);
    if relative.is_absolute() {
        return out_dir.join(file_name);
    }
    match relative.parent() {
        Some(folder) => out_dir.join(folder).join(file_name),
        None => out_dir.join(file_name),
    }
}

/// Write UTF-8 text, creating parent directories. The content goes to a
/// sibling temporary file first and is renamed into place.
pub async fn write_file_utf8(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    fs::write(&temp, content.as_bytes()).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}
