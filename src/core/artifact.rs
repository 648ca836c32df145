//! Build artifacts and the per-run artifact ledger.
//!
//! Every file a stage writes is reported back to the executor as a
//! [`BuildArtifact`]. The executor records them in an [`ArtifactLedger`];
//! later layers receive an immutable snapshot, so a stage only ever sees the
//! completed outputs of the layers before it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::pipeline::StageId;
use crate::utils::hash::ContentHash;

/// How an artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactTag {
    Compiled,
    Minified,
    Optimized,
    Copied,
    Assembled,
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compiled => "compiled",
            Self::Minified => "minified",
            Self::Optimized => "optimized",
            Self::Copied => "copied",
            Self::Assembled => "assembled",
        })
    }
}

/// A file written by exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub tag: ArtifactTag,
    pub fingerprint: ContentHash,
}

impl BuildArtifact {
    /// Describe an artifact already written to `path`.
    pub fn from_file(path: &Path, tag: ArtifactTag) -> Result<Self> {
        let fingerprint = ContentHash::of_file(path)
            .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            tag,
            fingerprint,
        })
    }

    /// Describe an artifact from the bytes just written to `path`.
    pub fn from_bytes(path: &Path, tag: ArtifactTag, bytes: &[u8]) -> Self {
        Self {
            path: path.to_path_buf(),
            tag,
            fingerprint: ContentHash::of_bytes(bytes),
        }
    }
}

/// Artifacts of one run, grouped by producing stage.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    by_stage: BTreeMap<StageId, Vec<BuildArtifact>>,
}

impl ArtifactLedger {
    /// Record a stage's outputs, superseding anything it produced before.
    pub fn record(&mut self, stage: StageId, artifacts: Vec<BuildArtifact>) {
        self.by_stage.insert(stage, artifacts);
    }

    pub fn artifacts(&self, stage: StageId) -> &[BuildArtifact] {
        self.by_stage.get(&stage).map_or(&[], Vec::as_slice)
    }

    /// Which stage produced `path`, if any.
    pub fn producer(&self, path: &Path) -> Option<StageId> {
        self.by_stage
            .iter()
            .find(|(_, artifacts)| artifacts.iter().any(|a| a.path == path))
            .map(|(stage, _)| *stage)
    }

    pub fn len(&self) -> usize {
        self.by_stage.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageId;

    fn artifact(path: &str, body: &str) -> BuildArtifact {
        BuildArtifact::from_bytes(Path::new(path), ArtifactTag::Minified, body.as_bytes())
    }

    #[test]
    fn test_record_supersedes() {
        let stage = StageId::new("css:minify");
        let mut ledger = ArtifactLedger::default();
        ledger.record(stage, vec![artifact("dist/css/index.min.css", "a{}")]);
        ledger.record(stage, vec![artifact("dist/css/index.min.css", "b{}")]);

        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.artifacts(stage)[0].fingerprint,
            ContentHash::of_bytes(b"b{}")
        );
    }

    #[test]
    fn test_producer_lookup() {
        let mut ledger = ArtifactLedger::default();
        ledger.record(StageId::new("js:minify"), vec![artifact("dist/js/bundle.min.js", "")]);

        assert_eq!(
            ledger.producer(Path::new("dist/js/bundle.min.js")),
            Some(StageId::new("js:minify"))
        );
        assert_eq!(ledger.producer(Path::new("dist/index.min.html")), None);
        assert!(ledger.artifacts(StageId::new("html:minify")).is_empty());
    }

    #[test]
    fn test_from_file_matches_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bundle.js");
        std::fs::write(&path, "var a=1;").unwrap();

        let from_file = BuildArtifact::from_file(&path, ArtifactTag::Compiled).unwrap();
        let from_bytes = BuildArtifact::from_bytes(&path, ArtifactTag::Compiled, b"var a=1;");
        assert_eq!(from_file, from_bytes);
    }
}
