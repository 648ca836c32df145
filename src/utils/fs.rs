//! Filesystem helpers shared by stages.
//!
//! Every artifact write goes through [`write_atomic`]: the bytes land in a
//! temporary sibling file which is then renamed over the target, so readers
//! never observe a partially written artifact.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `contents` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents.as_ref())?;
        file.sync_all()?;
        fs::rename(&temp, path)?;
        Ok(())
    })();

    if result.is_err() {
        fs::remove_file(&temp).ok();
    }
    result.with_context(|| format!("Failed to write {}", path.display()))
}

/// Copy `src` to `dst` atomically.
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
    let bytes = fs::read(src).with_context(|| format!("Failed to read {}", src.display()))?;
    write_atomic(dst, bytes)
}

/// Collect all files under `dir` recursively, sorted by path.
///
/// A missing directory yields an empty list.
pub fn collect_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

/// `path` relative to `root` as a `/`-separated key.
///
/// Returns `None` when `path` is outside `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Whether a relative path stays inside its root (no `..`, not absolute).
pub fn is_contained(rel: &Path) -> bool {
    rel.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("css/nested/index.min.css");
        write_atomic(&target, "a{}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "a{}");

        write_atomic(&target, "b{}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "b{}");

        // no temp files left behind
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_collect_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/2.png"), "").unwrap();
        fs::write(dir.path().join("a.png"), "").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();

        let files = collect_files(dir.path());
        assert_eq!(files, vec![dir.path().join("a.png"), dir.path().join("b/2.png")]);
        assert!(collect_files(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_relative_key() {
        let root = Path::new("/site/dist");
        assert_eq!(
            relative_key(root, Path::new("/site/dist/css/index.min.css")).as_deref(),
            Some("css/index.min.css")
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/a.css")), None);
        assert_eq!(relative_key(root, root), None);
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("css/index.css")));
        assert!(is_contained(Path::new("./a")));
        assert!(!is_contained(Path::new("../secret")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
