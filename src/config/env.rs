//! Environment-sourced credentials.
//!
//! Read once at startup into an immutable [`Credentials`] snapshot, then
//! resolved into publish targets on demand. Nothing else in the crate calls
//! `std::env::var` for these values.
//!
//! A `.env` file in the project root supplies values the process
//! environment leaves unset; the environment always wins.
//!
//! | Variable            | Used by           | Default                     |
//! |---------------------|-------------------|-----------------------------|
//! | `PRODUCTION_HOST`   | `publish:remote`  | required                    |
//! | `PRODUCTION_PORT`   | `publish:remote`  | `[publish.remote] port`     |
//! | `PRODUCTION_USER`   | `publish:remote`  | `[publish.remote] user`     |
//! | `PRODUCTION_KEY`    | `publish:remote`  | required (`~` is expanded)  |
//! | `AWS_BUCKET_NAME`   | `publish:assets`  | required                    |
//! | `AWS_ACCESS_KEY_ID` | `publish:assets`  | required                    |
//! | `AWS_SECRET_KEY`    | `publish:assets`  | required                    |
//! | `AWS_REGION`        | `publish:assets`  | `[publish.assets] region`   |

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

use super::Config;
use crate::error::BuildError;
use crate::publish::{Bucket, RemoteHost};

/// Credential set a stage requires before the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Need {
    RemoteHost,
    Bucket,
}

impl Need {
    /// Variables without a config fallback.
    const fn required(self) -> &'static [&'static str] {
        match self {
            Self::RemoteHost => &["PRODUCTION_HOST", "PRODUCTION_KEY"],
            Self::Bucket => &["AWS_BUCKET_NAME", "AWS_ACCESS_KEY_ID", "AWS_SECRET_KEY"],
        }
    }
}

/// Optional dotenv file, relative to the project root.
pub const DOTENV_FILE: &str = ".env";

const VARIABLES: &[&str] = &[
    "PRODUCTION_HOST",
    "PRODUCTION_PORT",
    "PRODUCTION_USER",
    "PRODUCTION_KEY",
    "AWS_BUCKET_NAME",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_KEY",
    "AWS_REGION",
];

/// Snapshot of the credential variables. Empty values count as unset.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: FxHashMap<&'static str, String>,
}

impl Credentials {
    /// Read every known variable from the process environment, falling
    /// back to `<root>/.env`.
    pub fn load(root: &Path) -> Result<Self> {
        let file = read_dotenv(&root.join(DOTENV_FILE))?;
        Ok(Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file.get(name).cloned())
        }))
    }

    /// Build a snapshot from explicit pairs (unknown names are ignored).
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let pairs: FxHashMap<&str, &str> = pairs.into_iter().collect();
        Self::from_lookup(|name| pairs.get(name).map(|v| (*v).to_string()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = VARIABLES
            .iter()
            .filter_map(|&name| {
                let value = lookup(name)?.trim().to_string();
                (!value.is_empty()).then_some((name, value))
            })
            .collect();
        Self { vars }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Names of required variables that are unset for `need`.
    pub fn missing(&self, need: Need) -> Vec<&'static str> {
        need.required()
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }

    /// Fail with every missing variable across `needs`, or with the first
    /// malformed one.
    pub fn check(&self, needs: impl IntoIterator<Item = Need>) -> Result<(), BuildError> {
        let mut missing: Vec<&str> = Vec::new();
        let mut remote = false;
        for need in needs {
            remote |= need == Need::RemoteHost;
            for name in self.missing(need) {
                if !missing.contains(&name) {
                    missing.push(name);
                }
            }
        }
        if !missing.is_empty() {
            return Err(BuildError::Configuration(format!(
                "missing environment variable(s): {}",
                missing.join(", ")
            )));
        }
        if remote {
            self.port()?;
        }
        Ok(())
    }

    /// `PRODUCTION_PORT`, if set.
    fn port(&self) -> Result<Option<u16>, BuildError> {
        self.get("PRODUCTION_PORT")
            .map(|raw| {
                raw.parse::<u16>().ok().filter(|port| *port != 0).ok_or_else(|| {
                    BuildError::Configuration(format!("PRODUCTION_PORT is not a port number: `{raw}`"))
                })
            })
            .transpose()
    }

    /// Resolve the `publish:remote` target.
    pub fn remote_host(&self, config: &Config) -> Result<RemoteHost, BuildError> {
        self.check([Need::RemoteHost])?;
        let remote = &config.publish.remote;

        let port = self.port()?.unwrap_or(remote.port);
        let key = self.get("PRODUCTION_KEY").unwrap_or_default();
        let key_path = shellexpand::tilde(key).into_owned();

        Ok(RemoteHost {
            host: self.get("PRODUCTION_HOST").unwrap_or_default().to_string(),
            port,
            user: self
                .get("PRODUCTION_USER")
                .map_or_else(|| remote.user.clone(), str::to_string),
            key_path: PathBuf::from(key_path),
            path: remote.path.clone(),
        })
    }

    /// Resolve the `publish:assets` target.
    pub fn bucket(&self, config: &Config) -> Result<Bucket, BuildError> {
        self.check([Need::Bucket])?;
        Ok(Bucket {
            name: self.get("AWS_BUCKET_NAME").unwrap_or_default().to_string(),
            region: self
                .get("AWS_REGION")
                .map_or_else(|| config.publish.assets.region.clone(), str::to_string),
            access_key_id: self.get("AWS_ACCESS_KEY_ID").unwrap_or_default().to_string(),
            secret_access_key: self.get("AWS_SECRET_KEY").unwrap_or_default().to_string(),
        })
    }
}

/// Pairs from a dotenv file; a missing file is empty.
fn read_dotenv(path: &Path) -> Result<FxHashMap<String, String>> {
    if !path.is_file() {
        return Ok(FxHashMap::default());
    }
    dotenvy::from_path_iter(path)
        .with_context(|| format!("cannot read `{}`", path.display()))?
        .map(|item| item.with_context(|| format!("invalid line in `{}`", path.display())))
        .collect()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("Credentials").field("set", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_remote_vars() {
        let creds = Credentials::from_pairs([("PRODUCTION_HOST", "example.com")]);
        assert_eq!(creds.missing(Need::RemoteHost), vec!["PRODUCTION_KEY"]);
        let err = creds.check([Need::RemoteHost]).unwrap_err();
        assert!(err.to_string().contains("PRODUCTION_KEY"));
    }

    #[test]
    fn test_check_lists_all_missing_once() {
        let creds = Credentials::from_pairs([("AWS_SECRET_KEY", "  ")]);
        let err = creds.check([Need::Bucket, Need::Bucket]).unwrap_err();
        let msg = err.to_string();
        assert_eq!(msg.matches("AWS_SECRET_KEY").count(), 1);
        assert!(msg.contains("AWS_BUCKET_NAME"));
        assert!(msg.contains("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_remote_host_defaults_from_config() {
        let config = Config::default();
        let creds = Credentials::from_pairs([
            ("PRODUCTION_HOST", "203.0.113.7"),
            ("PRODUCTION_KEY", "/keys/deploy.pem"),
        ]);
        let host = creds.remote_host(&config).unwrap();
        assert_eq!(host.host, "203.0.113.7");
        assert_eq!(host.port, 22);
        assert_eq!(host.user, "ec2-user");
        assert_eq!(host.key_path, PathBuf::from("/keys/deploy.pem"));
    }

    #[test]
    fn test_remote_host_bad_port() {
        let creds = Credentials::from_pairs([
            ("PRODUCTION_HOST", "h"),
            ("PRODUCTION_KEY", "k"),
            ("PRODUCTION_PORT", "ssh"),
        ]);
        let err = creds.remote_host(&Config::default()).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_check_rejects_bad_port_before_run() {
        let creds = Credentials::from_pairs([
            ("PRODUCTION_HOST", "h"),
            ("PRODUCTION_KEY", "k"),
            ("PRODUCTION_PORT", "0"),
        ]);
        let err = creds.check([Need::RemoteHost]).unwrap_err();
        assert!(err.to_string().contains("PRODUCTION_PORT"));
        // only the remote target cares about the port
        assert!(creds.check([]).is_ok());
    }

    #[test]
    fn test_load_reads_dotenv() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DOTENV_FILE),
            "# deploy target\nSITEPIPE_TEST_UNUSED=1\nAWS_BUCKET_NAME=\"from-file\"\nAWS_ACCESS_KEY_ID=AKIA\n",
        )
        .unwrap();
        let creds = Credentials::load(dir.path()).unwrap();
        if std::env::var("AWS_BUCKET_NAME").is_err() {
            assert_eq!(creds.get("AWS_BUCKET_NAME"), Some("from-file"));
        }
        assert!(creds.get("SITEPIPE_TEST_UNUSED").is_none());
    }

    #[test]
    fn test_load_without_dotenv() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Credentials::load(dir.path()).is_ok());
    }

    #[test]
    fn test_dotenv_bad_line_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(DOTENV_FILE), "AWS_REGION='unterminated\n").unwrap();
        assert!(Credentials::load(dir.path()).is_err());
    }

    #[test]
    fn test_bucket_region_override() {
        let creds = Credentials::from_pairs([
            ("AWS_BUCKET_NAME", "assets"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_KEY", "secret"),
            ("AWS_REGION", "eu-west-1"),
        ]);
        let bucket = creds.bucket(&Config::default()).unwrap();
        assert_eq!(bucket.name, "assets");
        assert_eq!(bucket.region, "eu-west-1");
    }

    #[test]
    fn test_debug_hides_values() {
        let creds = Credentials::from_pairs([("AWS_SECRET_KEY", "hunter2")]);
        let debug = format!("{creds:?}");
        assert!(debug.contains("AWS_SECRET_KEY"));
        assert!(!debug.contains("hunter2"));
    }
}
