//! `<!-- build:KEY -->...<!-- endbuild -->` placeholder blocks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::ManifestEntry;
use crate::error::BuildError;

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*build:([\w-]+)\s*-->.*?<!--\s*endbuild\s*-->").unwrap()
});

/// Placeholder keys in document order (duplicates kept).
pub fn placeholder_keys(markup: &str) -> Vec<String> {
    BLOCK
        .captures_iter(markup)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Replace every placeholder block with its rendered manifest entry.
///
/// Fails on the first key without an entry; nothing is substituted then.
pub fn replace_placeholders(
    page: &Path,
    markup: &str,
    manifest: &BTreeMap<String, ManifestEntry>,
) -> Result<String, BuildError> {
    if let Some(key) = placeholder_keys(markup)
        .into_iter()
        .find(|key| !manifest.contains_key(key))
    {
        return Err(BuildError::MissingArtifact {
            page: page.to_path_buf(),
            key,
        });
    }

    Ok(BLOCK
        .replace_all(markup, |caps: &Captures| {
            manifest
                .get(&caps[1])
                .map_or_else(String::new, ManifestEntry::render)
        })
        .into_owned())
}
