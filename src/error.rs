//! Build error taxonomy.
//!
//! | Variant           | Fatal | Raised by                              |
//! |-------------------|-------|----------------------------------------|
//! | `Compile`         | yes   | `css:compile`, `js:compile`, minifiers |
//! | `Optimization`    | no    | `images:minify` (per file, reported)   |
//! | `MissingArtifact` | yes   | `html:minify`                          |
//! | `Transport`       | yes   | `publish:remote`, `publish:assets`     |
//! | `Configuration`   | yes   | run preflight, before any stage        |
//!
//! Stage functions propagate these through `anyhow`, so the run report can
//! attach the failing stage while `downcast_ref::<BuildError>()` still
//! recovers the typed error.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::publish::SyncReport;

/// Errors produced by pipeline components.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("compile error at {location}: {message}")]
    Compile {
        location: SourceLocation,
        message: String,
    },

    #[error("failed to optimize `{}`: {reason}", .path.display())]
    Optimization { path: PathBuf, reason: String },

    #[error("placeholder `{key}` in `{}` has no manifest entry", .page.display())]
    MissingArtifact { page: PathBuf, key: String },

    #[error("transport error ({target}): {message}")]
    Transport {
        target: String,
        message: String,
        /// Object-store progress at the time of failure.
        report: Option<Box<SyncReport>>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BuildError {
    /// Compile error without a known line/column.
    pub fn compile(path: &Path, message: impl Into<String>) -> Self {
        Self::Compile {
            location: SourceLocation::file(path),
            message: message.into(),
        }
    }

    /// Transport error without sync progress.
    pub fn transport(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.into(),
            report: None,
        }
    }
}

/// Where in a source file a problem was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: Option<usize>,
    /// 1-based column number.
    pub column: Option<usize>,
}

impl SourceLocation {
    pub fn file(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            line: None,
            column: None,
        }
    }

    pub fn at(path: &Path, line: usize, column: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Compute line/column of a byte offset into `source`.
    pub fn from_offset(path: &Path, source: &str, offset: usize) -> Self {
        let before = &source[..offset.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
        Self::at(path, line, column)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, ":{line}:{column}"),
            (Some(line), None) => write!(f, ":{line}"),
            _ => Ok(()),
        }
    }
}
