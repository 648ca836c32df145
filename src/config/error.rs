//! Errors raised while loading `sitepipe.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid sitepipe.toml")]
    Toml(#[from] toml::de::Error),

    /// A glob in `field` does not compile.
    #[error("{field}: invalid pattern: {reason}")]
    Pattern { field: &'static str, reason: String },

    #[error("{0}")]
    Validation(String),
}
