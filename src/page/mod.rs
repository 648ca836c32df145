//! Page assembly: placeholder substitution, CDN references and minification.
//!
//! ```text
//! app/index.html ──► build blocks ──► src/href to CDN ──► minify ──► dist/index.min.html
//! ```
//!
//! A page is written only after every step succeeded, so a missing manifest
//! entry never leaves a half-assembled file behind.

mod cdn;
mod minify;
mod placeholder;

pub use cdn::rewrite_asset_refs;
pub use minify::minify_markup;
pub use placeholder::replace_placeholders;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{ArtifactTag, BuildArtifact};
use crate::error::BuildError;
use crate::utils::fs::{collect_files, relative_key, write_atomic};
use crate::utils::glob::GlobSet;

/// What a `<!-- build:KEY -->` block is replaced with.
///
/// In TOML either a bare path or `{ path, tpl }`; `%s` in the template
/// stands for the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Path(String),
    Template { path: String, tpl: String },
}

impl ManifestEntry {
    pub fn path(&self) -> &str {
        match self {
            Self::Path(path) | Self::Template { path, .. } => path,
        }
    }

    /// Render the replacement markup.
    pub fn render(&self) -> String {
        let tpl = match self {
            Self::Path(path) => default_template(path),
            Self::Template { tpl, .. } => tpl,
        };
        tpl.replace("%s", self.path())
    }
}

fn default_template(path: &str) -> &'static str {
    if path.ends_with(".css") {
        r#"<link rel="stylesheet" href="%s">"#
    } else {
        r#"<script src="%s"></script>"#
    }
}

/// Turns authored pages into deployable ones.
#[derive(Debug, Clone, Default)]
pub struct PageAssembler {
    manifest: BTreeMap<String, ManifestEntry>,
    /// CDN base and the tree whose files it serves.
    cdn: Option<(String, PathBuf)>,
}

impl PageAssembler {
    pub fn new(manifest: BTreeMap<String, ManifestEntry>) -> Self {
        Self {
            manifest,
            cdn: None,
        }
    }

    /// Rewrite references to files under `asset_root` onto `base`.
    pub fn with_cdn(mut self, base: impl Into<String>, asset_root: impl Into<PathBuf>) -> Self {
        self.cdn = Some((base.into(), asset_root.into()));
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let assembler = Self::new(config.pages.manifest.clone());
        match config.cdn_base() {
            Some(base) => assembler.with_cdn(base, config.source_dir()),
            None => assembler,
        }
    }

    /// Assemble one page. `page` is used for error reporting only.
    pub fn assemble(&self, page: &Path, markup: &str) -> Result<String, BuildError> {
        let replaced = replace_placeholders(page, markup, &self.manifest)?;
        let referenced = match &self.cdn {
            Some((base, root)) => rewrite_asset_refs(&replaced, base, root),
            None => replaced,
        };
        Ok(minify_markup(&referenced))
    }

    /// Assemble `src` into `out_dir`, inserting `suffix` before the extension.
    pub fn assemble_file(&self, src: &Path, out_dir: &Path, suffix: &str) -> Result<PathBuf> {
        let markup = fs::read_to_string(src)
            .with_context(|| format!("Failed to read {}", src.display()))?;
        let assembled = self.assemble(src, &markup)?;

        let target = out_dir.join(suffixed_name(src, suffix));
        write_atomic(&target, &assembled)?;
        Ok(target)
    }
}

/// `index.html` + `.min` -> `index.min.html`
fn suffixed_name(path: &Path, suffix: &str) -> String {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    }
}

/// `html:minify`: assemble every page matched by `[pages] include`.
///
/// Pages keep their directory relative to the source root.
pub fn build_pages(config: &Config) -> Result<Vec<BuildArtifact>> {
    let source = config.source_dir();
    let output = config.output_dir();
    let include = GlobSet::new(&config.pages.include).context("invalid `[pages] include` pattern")?;
    let assembler = PageAssembler::from_config(config);

    let mut artifacts = Vec::new();
    for file in collect_files(&source) {
        let Some(key) = relative_key(&source, &file) else {
            continue;
        };
        if !include.is_match(&key) {
            continue;
        }
        let out_dir = match Path::new(&key).parent() {
            Some(parent) => output.join(parent),
            None => output.clone(),
        };
        let target = assembler.assemble_file(&file, &out_dir, &config.pages.suffix)?;
        crate::debug!("html:minify"; "{key} -> {}", target.display());
        artifacts.push(BuildArtifact::from_file(&target, ArtifactTag::Assembled)?);
    }
    Ok(artifacts)
}
