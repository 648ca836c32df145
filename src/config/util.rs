//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from `start`
///
/// Walks up parent directories until finding `config_name`.
/// Returns the path to the config file if found.
///
/// # Example
/// ```text
/// /home/user/site/app/scss/   ← start
/// /home/user/site/sitepipe.toml  ← found!
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_file_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("app/scss");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("sitepipe.toml"), "").unwrap();

        let found = find_config_file(&nested, Path::new("sitepipe.toml")).unwrap();
        assert_eq!(found, dir.path().join("sitepipe.toml"));
    }

    #[test]
    fn test_find_config_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(find_config_file(dir.path(), Path::new("no-such-config-7f3a.toml")).is_none());
    }

    #[test]
    fn test_find_config_file_ignores_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub/sitepipe.toml")).unwrap();
        fs::write(dir.path().join("sitepipe.toml"), "").unwrap();

        let found = find_config_file(&dir.path().join("sub"), Path::new("sitepipe.toml")).unwrap();
        assert_eq!(found, dir.path().join("sitepipe.toml"));
    }
}
