//! `[paths]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! source = "app"          # Authored markup, styles, scripts, images, fonts
//! output = "dist"         # Build output (publish scope for the object store)
//! vendor = "vendor"       # Third-party assets copied from the dependency cache
//! deps = "node_modules"   # Dependency cache (never published)
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project layout, relative to the config file's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    pub vendor: PathBuf,
    pub deps: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "app".into(),
            output: "dist".into(),
            vendor: "vendor".into(),
            deps: "node_modules".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::Path;

    #[test]
    fn test_paths_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.paths.source, Path::new("app"));
        assert_eq!(config.paths.output, Path::new("dist"));
        assert_eq!(config.paths.deps, Path::new("node_modules"));
    }

    #[test]
    fn test_paths_override() {
        let config = test_parse_config("[paths]\nsource = \"src\"\noutput = \"public\"");
        assert_eq!(config.paths.source, Path::new("src"));
        assert_eq!(config.paths.output, Path::new("public"));
        assert_eq!(config.paths.vendor, Path::new("vendor"));
    }
}
