//! Deployment targets.
//!
//! - `publish:remote` mirrors the project tree onto a host with `rsync`
//!   over `ssh` ([`publish_to_filesystem`]).
//! - `publish:assets` syncs the output tree with an object store
//!   ([`publish_to_object_store`]): changed or new objects are uploaded,
//!   objects that no longer exist locally are deleted.
//!
//! With a version configured, `publish:assets` keys and the CDN base share
//! a `<prefix>/<version>/` segment (see [`version`]).
//!
//! Targets are resolved from [`crate::config::Credentials`] right before the
//! stage runs and never logged with their secrets.

mod remote;
mod s3;
mod scope;
mod store;
pub mod version;

pub use remote::{publish_to_filesystem, rsync_command};
pub use s3::AwsCliStore;
pub use scope::PublishScope;
pub use store::{ObjectStore, SyncReport, publish_to_object_store};
pub use version::AssetVersion;

#[cfg(test)]
pub use store::MemoryStore;

use std::fmt;
use std::path::PathBuf;

use crate::config::Config;

/// `publish:remote` destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key passed to `ssh -i`.
    pub key_path: PathBuf,
    /// Absolute path on the host.
    pub path: String,
}

impl RemoteHost {
    /// `user@host:path`
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.path)
    }
}

/// `publish:assets` destination.
#[derive(Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Headers applied to every uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub cache_control: String,
}

impl CachePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_control: config.publish.assets.cache_control.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_debug_hides_secret() {
        let bucket = Bucket {
            name: "assets".into(),
            region: "us-west-2".into(),
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI".into(),
        };
        let shown = format!("{bucket:?}");
        assert!(shown.contains("AKIDEXAMPLE"));
        assert!(!shown.contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn test_remote_destination() {
        let host = RemoteHost {
            host: "example.com".into(),
            port: 22,
            user: "deploy".into(),
            key_path: PathBuf::from("/home/deploy/.ssh/id_ed25519"),
            path: "/srv/site".into(),
        };
        assert_eq!(host.destination(), "deploy@example.com:/srv/site");
    }

    #[test]
    fn test_cache_policy_default() {
        let config = crate::config::test_parse_config("");
        assert_eq!(
            CachePolicy::from_config(&config).cache_control,
            "max-age=315360000, no-transform, public"
        );
    }
}
