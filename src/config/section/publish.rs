//! `[publish]` section configuration.
//!
//! Host and bucket identities come from the environment (see
//! [`crate::config::Credentials`]); this section holds everything that is
//! safe to commit.
//!
//! # Example
//!
//! ```toml
//! [publish.remote]
//! source = "."                    # project root, relative to sitepipe.toml
//! path = "/srv/www/example.com"   # destination on the remote host
//! user = "ec2-user"               # fallback when PRODUCTION_USER is unset
//! port = 22                       # fallback when PRODUCTION_PORT is unset
//! exclude = ["node_modules"]
//!
//! [publish.assets]
//! exclude = ["vendor/**", "*.html", "*.docx"]
//! cache_control = "max-age=315360000, no-transform, public"
//! region = "us-west-2"            # fallback when AWS_REGION is unset
//! version = "git"                 # keys under assets/<short commit>/
//! prefix = "assets"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::publish::AssetVersion;

/// Publishing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub remote: RemoteConfig,
    pub assets: AssetsPublishConfig,
}

/// `publish:remote` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Local tree to transfer.
    pub source: PathBuf,
    /// Absolute destination path on the remote host.
    pub path: String,
    pub user: String,
    pub port: u16,
    /// rsync exclude patterns.
    pub exclude: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            source: ".".into(),
            path: "/srv/site".into(),
            user: "ec2-user".into(),
            port: 22,
            exclude: vec!["node_modules".into()],
        }
    }
}

/// `publish:assets` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsPublishConfig {
    /// Globs excluded from the sync scope on both sides.
    pub exclude: Vec<String>,
    /// `Cache-Control` header for every uploaded object.
    pub cache_control: String,
    pub region: String,
    /// Version segment inserted into every key and the CDN base.
    pub version: AssetVersion,
    /// Key prefix in front of the version segment.
    pub prefix: String,
}

impl Default for AssetsPublishConfig {
    fn default() -> Self {
        Self {
            exclude: ["vendor/**", "*.html", "*.docx"].map(String::from).to_vec(),
            cache_control: "max-age=315360000, no-transform, public".into(),
            region: "us-west-2".into(),
            version: AssetVersion::None,
            prefix: "assets".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::publish::AssetVersion;

    #[test]
    fn test_publish_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.publish.remote.user, "ec2-user");
        assert_eq!(config.publish.remote.port, 22);
        assert_eq!(config.publish.remote.exclude, vec!["node_modules".to_string()]);
        assert_eq!(
            config.publish.assets.cache_control,
            "max-age=315360000, no-transform, public"
        );
        assert_eq!(config.publish.assets.exclude.len(), 3);
        assert_eq!(config.publish.assets.version, AssetVersion::None);
    }

    #[test]
    fn test_publish_versioned() {
        let config = test_parse_config("[publish.assets]\nversion = \"git\"\nprefix = \"static\"");
        assert_eq!(config.publish.assets.version, AssetVersion::Git);
        assert_eq!(config.publish.assets.prefix, "static");
    }

    #[test]
    fn test_publish_override() {
        let config = test_parse_config(
            "[publish.remote]\npath = \"/srv/www\"\n\n[publish.assets]\nregion = \"eu-central-1\"",
        );
        assert_eq!(config.publish.remote.path, "/srv/www");
        assert_eq!(config.publish.remote.user, "ec2-user");
        assert_eq!(config.publish.assets.region, "eu-central-1");
    }
}
