//! Which keys take part in an object-store sync.

use anyhow::{Context, Result};

use crate::utils::glob::GlobSet;

/// Exclude globs applied identically to local and remote keys, so excluded
/// remote objects are never deleted.
///
/// With a key prefix, only keys under it are in scope; excludes match the
/// part after the prefix.
#[derive(Debug, Clone, Default)]
pub struct PublishScope {
    exclude: GlobSet,
    prefix: String,
}

impl PublishScope {
    pub fn new<S: AsRef<str>>(excludes: &[S]) -> Result<Self> {
        let exclude = GlobSet::new(excludes).context("invalid publish exclude pattern")?;
        Ok(Self {
            exclude,
            prefix: String::new(),
        })
    }

    /// Place every key under `prefix` (e.g. `assets/1a2b3c4/`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Object key for a path relative to the local root.
    pub fn key(&self, relative: &str) -> String {
        format!("{}{relative}", self.prefix)
    }

    pub fn contains(&self, key: &str) -> bool {
        key.strip_prefix(self.prefix.as_str())
            .is_some_and(|relative| !self.exclude.is_match(relative))
    }
}
