//! [`ObjectStore`] backed by the `aws s3api` command line client.
//!
//! Credentials and region travel in the child environment only, never on the
//! command line.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::store::{LocalObject, ObjectStore, RemoteObject};
use super::{Bucket, CachePolicy};
use crate::utils::exec::{Cmd, SILENT_FILTER, require_program};

pub struct AwsCliStore {
    bucket: Bucket,
}

impl AwsCliStore {
    /// Fails if `aws` is not on `PATH`.
    pub fn new(bucket: Bucket) -> Result<Self> {
        require_program("aws")?;
        Ok(Self { bucket })
    }

    fn s3api(&self, operation: &str) -> Cmd {
        Cmd::new("aws")
            .args(["s3api", operation, "--bucket", self.bucket.name.as_str()])
            .args(["--output", "json"])
            .envs([
                ("AWS_ACCESS_KEY_ID", self.bucket.access_key_id.as_str()),
                ("AWS_SECRET_ACCESS_KEY", self.bucket.secret_access_key.as_str()),
                ("AWS_DEFAULT_REGION", self.bucket.region.as_str()),
            ])
            .filter(&SILENT_FILTER)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjects {
    #[serde(default)]
    contents: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "ETag")]
    etag: String,
}

/// Parse `list-objects-v2` output. An empty bucket prints nothing.
fn parse_listing(stdout: &[u8]) -> Result<Vec<RemoteObject>> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(Vec::new());
    }
    let listing: ListObjects =
        serde_json::from_str(text).context("unexpected list-objects-v2 output")?;
    Ok(listing
        .contents
        .into_iter()
        .map(|entry| RemoteObject {
            key: entry.key,
            etag: entry.etag.trim_matches('"').to_ascii_lowercase(),
        })
        .collect())
}

impl ObjectStore for AwsCliStore {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket.name)
    }

    fn list(&self) -> Result<Vec<RemoteObject>> {
        let output = self.s3api("list-objects-v2").run()?;
        parse_listing(&output.stdout)
    }

    fn put(&self, object: &LocalObject, content_type: &str, cache: &CachePolicy) -> Result<()> {
        self.s3api("put-object")
            .args(["--key", object.key.as_str()])
            .arg("--body")
            .arg(&object.path)
            .args(["--content-type", content_type])
            .args(["--cache-control", cache.cache_control.as_str()])
            .run()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.s3api("delete-object").args(["--key", key]).run()?;
        Ok(())
    }
}
