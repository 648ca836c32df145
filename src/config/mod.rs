//! Project configuration for `sitepipe.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # Configuration section definitions
//! ├── env        # Credentials (environment snapshot)
//! ├── error      # ConfigError
//! ├── util       # Config file discovery
//! └── mod.rs     # Config (this file)
//! ```
//!
//! # Sections
//!
//! | Section            | Purpose                                         |
//! |--------------------|-------------------------------------------------|
//! | `[paths]`          | Source, output, vendor and dependency dirs      |
//! | `[cdn]`            | CDN base and stylesheet root prefix             |
//! | `[styles]`         | Sass entry, compiled and minified stylesheet    |
//! | `[scripts]`        | Script entry, bundle and minified bundle        |
//! | `[pages]`          | Page globs, output suffix, placeholder manifest |
//! | `[images]`         | Image dir, extensions, JPEG quality             |
//! | `[[copy]]`         | Static files copied verbatim                    |
//! | `[[vendor]]`       | Dependency-cache subsets copied to `vendor/`    |
//! | `[publish.*]`      | Remote host and object store settings           |
//! | `[serve]`          | Development server                              |
//!
//! The loaded [`Config`] is immutable: it is built once in `main`, then
//! borrowed by every stage.

mod env;
mod error;
pub mod section;
mod util;

pub use env::{Credentials, Need};
pub use error::ConfigError;
pub use section::{
    CdnConfig, CopyRule, ImagesConfig, PagesConfig, PathsConfig, PublishConfig, ScriptsConfig,
    ServeConfig, StylesConfig, VendorPackage,
};

use crate::cli::{Cli, Commands};
use crate::log;
use crate::publish::version::{self, key_prefix};
use crate::utils::glob::GlobSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use util::find_config_file;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sitepipe.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Resolved `[publish.assets] version` for this run (internal use only)
    #[serde(skip)]
    pub asset_version: Option<String>,

    pub paths: PathsConfig,
    pub cdn: CdnConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub pages: PagesConfig,
    pub images: ImagesConfig,
    pub copy: Vec<CopyRule>,
    pub vendor: Vec<VendorPackage>,
    pub publish: PublishConfig,
    pub serve: ServeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            asset_version: None,
            paths: PathsConfig::default(),
            cdn: CdnConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            pages: PagesConfig::default(),
            images: ImagesConfig::default(),
            copy: CopyRule::defaults(),
            vendor: Vec::new(),
            publish: PublishConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file; the project root is the
    /// config file's parent directory. Without a config file, defaults are
    /// used with cwd as root.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cwd, &cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                config.config_path = path;
                config
            }
            None => {
                log!("warning"; "{} not found, using defaults", cli.config.display());
                Self {
                    root: cwd,
                    ..Self::default()
                }
            }
        };

        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        if let Commands::Serve {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Check values serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.cdn.base
            && !(base.starts_with("https://") || base.starts_with("http://") || base.starts_with("//"))
        {
            return Err(ConfigError::Validation(format!(
                "cdn.base must be an absolute URL, got `{base}`"
            )));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(format!(
                "images.jpeg_quality must be within 1..=100, got {}",
                self.images.jpeg_quality
            )));
        }
        if self.pages.suffix.is_empty() {
            return Err(ConfigError::Validation(
                "pages.suffix must not be empty (output would overwrite the source page)".into(),
            ));
        }
        for package in &self.vendor {
            if package.name.is_empty() || package.name.contains(['/', '\\']) || package.name == ".." {
                return Err(ConfigError::Validation(format!(
                    "vendor.name `{}` must be a plain directory name",
                    package.name
                )));
            }
        }
        if self.publish.assets.prefix.split('/').any(|segment| segment == "..") {
            return Err(ConfigError::Validation(format!(
                "publish.assets.prefix `{}` must not contain `..`",
                self.publish.assets.prefix
            )));
        }
        if self.serve.debounce_ms == 0 {
            return Err(ConfigError::Validation("serve.debounce_ms must be positive".into()));
        }

        for (field, patterns) in [
            ("pages.include", &self.pages.include),
            ("publish.assets.exclude", &self.publish.assets.exclude),
        ] {
            GlobSet::new(patterns).map_err(|e| ConfigError::Pattern {
                field,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    // ========================================================================
    // path accessors
    // ========================================================================

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root_join(&self.paths.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root_join(&self.paths.output)
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.root_join(&self.paths.vendor)
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.root_join(&self.paths.deps)
    }

    /// Normalized CDN base (always ends with `/`), if configured.
    pub fn cdn_base(&self) -> Option<String> {
        self.cdn.base.as_deref().map(|base| {
            let base = base.trim_end_matches('/');
            format!("{base}/{}", self.asset_prefix().unwrap_or_default())
        })
    }

    /// `<prefix>/<version>/` once a version has been resolved.
    pub fn asset_prefix(&self) -> Option<String> {
        self.asset_version
            .as_deref()
            .map(|version| key_prefix(&self.publish.assets.prefix, version))
    }

    /// Resolve the asset version for a build or deploy run.
    pub fn resolve_asset_version(&mut self) -> Result<()> {
        self.asset_version = version::resolve(self.publish.assets.version, &self.root)?;
        if let Some(prefix) = self.asset_prefix() {
            log!("publish:assets"; "versioned keys under {prefix}");
        }
        Ok(())
    }
}

/// Parse a config snippet (tests only).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    Config::parse_with_ignored(content)
        .map(|(config, _)| config)
        .unwrap_or_else(|e| panic!("config snippet must parse: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_collected() {
        let (config, ignored) =
            Config::parse_with_ignored("[paths]\nsource = \"src\"\nsourse = \"typo\"\n\n[extra]\na = 1")
                .unwrap();
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(ignored, vec!["paths.sourse".to_string(), "extra".to_string()]);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::parse_with_ignored("[paths\nsource = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_validate_cdn_base() {
        let mut config = test_parse_config("[cdn]\nbase = \"assets.example.com\"");
        assert!(config.validate().is_err());
        config.cdn.base = Some("https://assets.example.com".into());
        assert!(config.validate().is_ok());
        assert_eq!(config.cdn_base().as_deref(), Some("https://assets.example.com/"));
    }

    #[test]
    fn test_cdn_base_carries_asset_version() {
        let mut config = test_parse_config("[cdn]\nbase = \"https://assets.example.com/\"");
        assert_eq!(config.asset_prefix(), None);
        config.asset_version = Some("1a2b3c4".into());
        assert_eq!(config.asset_prefix().as_deref(), Some("assets/1a2b3c4/"));
        assert_eq!(
            config.cdn_base().as_deref(),
            Some("https://assets.example.com/assets/1a2b3c4/")
        );
    }

    #[test]
    fn test_validate_asset_prefix() {
        let config = test_parse_config("[publish.assets]\nprefix = \"../up\"");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_vendor_name() {
        let config = test_parse_config("[[vendor]]\nname = \"../etc\"\nfrom = \"x\"");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_globs() {
        let config = test_parse_config("[publish.assets]\nexclude = [\"{a,b\"]");
        match config.validate() {
            Err(ConfigError::Pattern { field, .. }) => assert_eq!(field, "publish.assets.exclude"),
            other => panic!("expected pattern error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_jpeg_quality() {
        let config = test_parse_config("[images]\njpeg_quality = 0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_join_root() {
        let config = Config {
            root: PathBuf::from("/site"),
            ..Config::default()
        };
        assert_eq!(config.source_dir(), PathBuf::from("/site/app"));
        assert_eq!(config.output_dir(), PathBuf::from("/site/dist"));
        assert_eq!(config.deps_dir(), PathBuf::from("/site/node_modules"));
    }
}
