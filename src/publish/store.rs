//! Object-store sync: plan from local MD5s and remote ETags, then execute.
//!
//! The plan is computed once from two listings filtered through the same
//! [`PublishScope`]:
//!
//! | Local | Remote            | Action   |
//! |-------|-------------------|----------|
//! | yes   | no                | upload   |
//! | yes   | ETag != MD5       | upload   |
//! | yes   | ETag == MD5       | none     |
//! | no    | yes               | delete   |
//!
//! Execution uploads first, then deletes, and stops at the first failure.
//! Nothing is rolled back; the error carries a [`SyncReport`] with what was
//! done and what is still pending.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::{CachePolicy, PublishScope};
use crate::error::BuildError;
use crate::utils::fs::{collect_files, relative_key};
use crate::utils::hash::md5_file;
use crate::utils::mime;
use crate::{debug, log};

/// An object as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Hex digest without surrounding quotes.
    pub etag: String,
}

/// A file under the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalObject {
    pub key: String,
    pub path: PathBuf,
    pub md5: String,
}

/// Minimal object-store surface the sync needs.
pub trait ObjectStore: Send + Sync {
    /// Human-readable target for logs and errors.
    fn describe(&self) -> String;

    fn list(&self) -> Result<Vec<RemoteObject>>;

    fn put(&self, object: &LocalObject, content_type: &str, cache: &CachePolicy) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Operations needed to make the remote set equal the local set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub uploads: Vec<LocalObject>,
    pub deletes: Vec<String>,
    pub unchanged: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of executing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: usize,
    /// Key whose operation failed.
    pub failed: Option<String>,
    /// Keys not attempted (after a failure, or in a dry run).
    pub pending: Vec<String>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} deleted, {} unchanged",
            self.uploaded.len(),
            self.deleted.len(),
            self.unchanged
        )?;
        if let Some(key) = &self.failed {
            write!(f, ", failed at `{key}`")?;
        }
        if !self.pending.is_empty() {
            write!(f, ", {} pending", self.pending.len())?;
        }
        Ok(())
    }
}

/// Files under `root` in scope, with their MD5 digests.
pub fn local_objects(root: &Path, scope: &PublishScope) -> Result<Vec<LocalObject>> {
    let files: Vec<(String, PathBuf)> = collect_files(root)
        .into_iter()
        .filter_map(|path| Some((scope.key(&relative_key(root, &path)?), path)))
        .filter(|(key, _)| scope.contains(key))
        .collect();

    files
        .into_par_iter()
        .map(|(key, path)| {
            let md5 = md5_file(&path).with_context(|| format!("Failed to hash {}", path.display()))?;
            Ok(LocalObject { key, path, md5 })
        })
        .collect()
}

/// Compute uploads and deletes. Keys outside `scope` are ignored on both sides.
pub fn plan_sync(local: Vec<LocalObject>, remote: Vec<RemoteObject>, scope: &PublishScope) -> SyncPlan {
    let mut remote: BTreeMap<String, String> = remote
        .into_iter()
        .filter(|object| scope.contains(&object.key))
        .map(|object| (object.key, object.etag))
        .collect();

    let mut plan = SyncPlan::default();
    let mut local: Vec<_> = local.into_iter().filter(|object| scope.contains(&object.key)).collect();
    local.sort_by(|a, b| a.key.cmp(&b.key));

    for object in local {
        match remote.remove(&object.key) {
            Some(etag) if etag.eq_ignore_ascii_case(&object.md5) => plan.unchanged.push(object.key),
            _ => plan.uploads.push(object),
        }
    }
    // whatever is left has no local counterpart
    plan.deletes = remote.into_keys().collect();
    plan
}

/// Run `plan` against `store`.
pub fn execute_plan(
    plan: SyncPlan,
    store: &dyn ObjectStore,
    cache: &CachePolicy,
    dry_run: bool,
) -> Result<SyncReport, BuildError> {
    let mut report = SyncReport {
        unchanged: plan.unchanged.len(),
        ..SyncReport::default()
    };

    if dry_run {
        for object in &plan.uploads {
            log!("publish:assets"; "would upload {}", object.key);
        }
        for key in &plan.deletes {
            log!("publish:assets"; "would delete {key}");
        }
        report.pending = plan
            .uploads
            .into_iter()
            .map(|object| object.key)
            .chain(plan.deletes)
            .collect();
        return Ok(report);
    }

    let mut uploads = plan.uploads.into_iter();
    while let Some(object) = uploads.next() {
        let content_type = mime::from_path(&object.path);
        if let Err(e) = store.put(&object, content_type, cache) {
            report.pending = uploads.map(|o| o.key).chain(plan.deletes).collect();
            return Err(failure(store, report, object.key, &e));
        }
        debug!("publish:assets"; "uploaded {} ({content_type})", object.key);
        report.uploaded.push(object.key);
    }

    let mut deletes = plan.deletes.into_iter();
    while let Some(key) = deletes.next() {
        if let Err(e) = store.delete(&key) {
            report.pending = deletes.collect();
            return Err(failure(store, report, key, &e));
        }
        debug!("publish:assets"; "deleted {key}");
        report.deleted.push(key);
    }

    Ok(report)
}

fn failure(store: &dyn ObjectStore, mut report: SyncReport, key: String, error: &anyhow::Error) -> BuildError {
    let message = format!("`{key}`: {error:#}");
    report.failed = Some(key);
    let message = format!("{message} ({report})");
    BuildError::Transport {
        target: store.describe(),
        message,
        report: Some(Box::new(report)),
    }
}

/// Sync `local_root` with `store`.
pub fn publish_to_object_store(
    local_root: &Path,
    store: &dyn ObjectStore,
    scope: &PublishScope,
    cache: &CachePolicy,
    dry_run: bool,
) -> Result<SyncReport, BuildError> {
    let target = store.describe();
    let remote = store
        .list()
        .map_err(|e| BuildError::transport(target.clone(), format!("listing objects: {e:#}")))?;
    let local = local_objects(local_root, scope)
        .map_err(|e| BuildError::transport(target.clone(), format!("reading local tree: {e:#}")))?;

    let plan = plan_sync(local, remote, scope);
    log!(
        "publish:assets";
        "{target}: {} to upload, {} to delete, {} unchanged",
        plan.uploads.len(),
        plan.deletes.len(),
        plan.unchanged.len()
    );

    let report = execute_plan(plan, store, cache, dry_run)?;
    log!("publish:assets"; "{report}");
    Ok(report)
}

/// In-memory store for tests: records every mutation, optionally fails on
/// one key.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub objects: parking_lot::Mutex<BTreeMap<String, String>>,
    pub ops: parking_lot::Mutex<Vec<String>>,
    pub fail_on: Option<String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_objects<'a>(objects: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let objects = objects
            .into_iter()
            .map(|(key, etag)| (key.to_string(), etag.to_string()))
            .collect();
        Self {
            objects: parking_lot::Mutex::new(objects),
            ..Self::default()
        }
    }

    fn check(&self, key: &str) -> Result<()> {
        match &self.fail_on {
            Some(bad) if bad == key => anyhow::bail!("connection reset"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
impl ObjectStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".into()
    }

    fn list(&self) -> Result<Vec<RemoteObject>> {
        Ok(self
            .objects
            .lock()
            .iter()
            .map(|(key, etag)| RemoteObject {
                key: key.clone(),
                etag: etag.clone(),
            })
            .collect())
    }

    fn put(&self, object: &LocalObject, content_type: &str, cache: &CachePolicy) -> Result<()> {
        self.check(&object.key)?;
        self.ops.lock().push(format!(
            "put {} {content_type} {}",
            object.key, cache.cache_control
        ));
        self.objects.lock().insert(object.key.clone(), object.md5.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check(key)?;
        self.ops.lock().push(format!("delete {key}"));
        self.objects.lock().remove(key);
        Ok(())
    }
}
