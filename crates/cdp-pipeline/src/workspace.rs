//! Working directory layout
//!
//! Every component receives the directory explicitly; nothing here changes the
//! process current directory.

use crate::sink::{FIRST_SINK_FILE, SECOND_SINK_FILE};
use cdp_common::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const ARCHIVE_EXTENSION: &str = "zip";

/// What `clean` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanScope {
    /// Archives and output tables
    All,
    Archives,
    Outputs,
}

/// Create `path` (and parents) if missing
pub fn prepare_working_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)?;
    debug!(working_dir = %path.display(), "Working directory ready");
    Ok(path.to_path_buf())
}

/// Path of archive `index` inside `dir`
pub fn archive_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.{}", index, ARCHIVE_EXTENSION))
}

/// Archive index encoded in a file stem such as `12.zip`
pub fn archive_index(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Every `*.zip` directly inside `dir`
///
/// Numbered archives come first in index order, anything else after them by
/// name.
pub fn discover_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(ARCHIVE_EXTENSION) {
            archives.push(path.to_path_buf());
        }
    }

    archives.sort_by(|a, b| {
        let key = |p: &Path| archive_index(p).unwrap_or(usize::MAX);
        key(a).cmp(&key(b)).then_with(|| a.cmp(b))
    });

    debug!(dir = %dir.display(), archives = archives.len(), "Discovered archives");
    Ok(archives)
}

/// Remove generated files, returning how many were deleted
pub fn clean(dir: &Path, scope: CleanScope) -> Result<usize> {
    let mut targets = Vec::new();

    if matches!(scope, CleanScope::All | CleanScope::Archives) && dir.exists() {
        targets.extend(discover_archives(dir)?);
    }
    if matches!(scope, CleanScope::All | CleanScope::Outputs) {
        targets.extend(
            [FIRST_SINK_FILE, SECOND_SINK_FILE]
                .iter()
                .map(|name| dir.join(name))
                .filter(|path| path.exists()),
        );
    }

    for path in &targets {
        fs::remove_file(path)?;
    }

    info!(dir = %dir.display(), removed = targets.len(), ?scope, "Cleaned working directory");
    Ok(targets.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_prepare_creates_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");

        let prepared = prepare_working_dir(&nested).unwrap();
        assert_eq!(prepared, nested);
        assert!(nested.is_dir());

        // Idempotent on an existing directory
        prepare_working_dir(&nested).unwrap();
    }

    #[test]
    fn test_discover_orders_by_archive_index() {
        let tmp = TempDir::new().unwrap();
        for name in ["10.zip", "2.zip", "0.zip", "notes.txt", "first.csv", "manual.zip"] {
            touch(tmp.path(), name);
        }
        fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested"), "99.zip");

        let names: Vec<_> = discover_archives(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["0.zip", "2.zip", "10.zip", "manual.zip"]);
    }

    #[test]
    fn test_discover_in_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_archives(&tmp.path().join("absent")).is_err());
    }

    #[test]
    fn test_clean_scopes() {
        let tmp = TempDir::new().unwrap();
        for name in ["0.zip", "1.zip", FIRST_SINK_FILE, SECOND_SINK_FILE, "keep.txt"] {
            touch(tmp.path(), name);
        }

        assert_eq!(clean(tmp.path(), CleanScope::Outputs).unwrap(), 2);
        assert!(!tmp.path().join(FIRST_SINK_FILE).exists());
        assert!(tmp.path().join("0.zip").exists());

        assert_eq!(clean(tmp.path(), CleanScope::Archives).unwrap(), 2);
        assert_eq!(clean(tmp.path(), CleanScope::All).unwrap(), 0);
        assert!(tmp.path().join("keep.txt").exists());
    }

    #[test]
    fn test_archive_naming() {
        let path = archive_path(Path::new("/work"), 7);
        assert_eq!(path, PathBuf::from("/work/7.zip"));
        assert_eq!(archive_index(&path), Some(7));
        assert_eq!(archive_index(Path::new("manual.zip")), None);
    }
}
