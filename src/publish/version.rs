//! Versioned asset keys.
//!
//! With `[publish.assets] version = "git"`, every object goes under
//! `<prefix>/<short commit>/` and the CDN base points there too, so a new
//! deploy never collides with what clients already cached. Older versions
//! are outside the sync scope and stay in the bucket.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::utils::exec::{Cmd, require_program};

/// Where the version segment comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetVersion {
    /// Fixed keys.
    #[default]
    None,
    /// Short hash of the checked-out commit.
    Git,
}

/// Resolve the version segment for this run.
pub fn resolve(version: AssetVersion, root: &Path) -> Result<Option<String>> {
    match version {
        AssetVersion::None => Ok(None),
        AssetVersion::Git => git_revision(root).map(Some),
    }
}

/// `git rev-parse --short HEAD` in `root`.
pub fn git_revision(root: &Path) -> Result<String> {
    require_program("git")?;
    let output = Cmd::new("git")
        .arg("-C")
        .arg(root)
        .args(["rev-parse", "--short", "HEAD"])
        .run()
        .context("cannot determine asset version from git")?;

    let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if revision.is_empty() {
        bail!("git returned an empty revision");
    }
    Ok(revision)
}

/// `assets` + `1a2b3c4` -> `assets/1a2b3c4/`
pub fn key_prefix(prefix: &str, version: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{version}/")
    } else {
        format!("{prefix}/{version}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("assets", "1a2b3c4"), "assets/1a2b3c4/");
        assert_eq!(key_prefix("/static/", "v2"), "static/v2/");
        assert_eq!(key_prefix("", "v2"), "v2/");
    }

    #[test]
    fn test_unversioned_resolves_to_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(resolve(AssetVersion::None, dir.path()).unwrap(), None);
    }
}
