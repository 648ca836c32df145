//! File watching for the dev server.
//!
//! ```text
//! notify ──► channel ──► classify ──► Debouncer ──► rebuild ──► ReloadServer
//!                        (WatchGroup)  (per group)   (one at a time)
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::event::{EventKind, ModifyKind};
use notify::{RecursiveMode, Watcher};

use super::reload::{ReloadMessage, ReloadServer};
use crate::compiler::{build_scripts, build_styles};
use crate::config::Config;
use crate::core::is_shutdown;
use crate::error::BuildError;
use crate::logger::{status_error, status_success};
use crate::{debug, log};

/// Upper bound on one wait, so shutdown is noticed while idle.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// What a changed file triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchGroup {
    /// Sass sources: recompile, then patch stylesheets in place.
    Styles,
    /// Script modules: rebundle, then reload.
    Scripts,
    /// Pages: reload.
    Markup,
}

/// Check if path is a temporary/backup file that should be ignored
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Access and metadata-only events never change what a rebuild produces.
fn is_content_change(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_)))
}

/// Maps changed paths to watch groups.
#[derive(Debug, Clone)]
pub struct WatchRules {
    source: PathBuf,
    /// Compiler outputs; writing them must not trigger another rebuild.
    generated: Vec<PathBuf>,
}

impl WatchRules {
    pub fn from_config(config: &Config) -> Self {
        let source = config.source_dir();
        let source = source.canonicalize().unwrap_or(source);
        let generated = vec![
            source.join(&config.styles.output),
            source.join(&config.scripts.bundle),
        ];
        Self { source, generated }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn classify(&self, path: &Path) -> Option<WatchGroup> {
        if is_temp_file(path) || self.generated.iter().any(|g| g == path) {
            return None;
        }
        path.strip_prefix(&self.source).ok()?;

        match path.extension().and_then(|e| e.to_str())? {
            "scss" | "sass" => Some(WatchGroup::Styles),
            "js" => Some(WatchGroup::Scripts),
            "html" | "htm" => Some(WatchGroup::Markup),
            // compiled stylesheets live next to the sources
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    last_event: Instant,
    pending: bool,
}

/// Per-group trailing-edge debounce.
///
/// A group is ready once `window` has passed since its most recent event,
/// so a burst of saves yields exactly one rebuild.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    groups: BTreeMap<WatchGroup, GroupState>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            groups: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, group: WatchGroup, now: Instant) {
        self.groups.insert(
            group,
            GroupState {
                last_event: now,
                pending: true,
            },
        );
    }

    /// Groups whose window has elapsed, in `WatchGroup` order. They are no
    /// longer pending afterwards.
    pub fn take_ready(&mut self, now: Instant) -> Vec<WatchGroup> {
        let window = self.window;
        self.groups
            .iter_mut()
            .filter(|(_, s)| s.pending && now.saturating_duration_since(s.last_event) >= window)
            .map(|(group, s)| {
                s.pending = false;
                *group
            })
            .collect()
    }

    /// Earliest instant at which a pending group becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups
            .values()
            .filter(|s| s.pending)
            .map(|s| s.last_event + self.window)
            .min()
    }
}

/// Run the watch loop until shutdown. Each ready group is rebuilt to
/// completion before more events are drained.
pub fn run_watch_loop(config: &Config, reload: &ReloadServer, shutdown_rx: &Receiver<()>) -> Result<()> {
    let rules = WatchRules::from_config(config);
    let (tx, rx) = channel::unbounded::<notify::Result<notify::Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to create file watcher")?;
    watcher
        .watch(rules.source(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", rules.source().display()))?;
    debug!("watch"; "watching {}", rules.source().display());

    let mut debouncer = Debouncer::new(config.serve.debounce());

    loop {
        if is_shutdown() || shutdown_rx.try_recv().is_ok() {
            break;
        }

        let timeout = debouncer
            .next_deadline()
            .map_or(IDLE_POLL, |d| d.saturating_duration_since(Instant::now()))
            .min(IDLE_POLL);

        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) if is_content_change(&event.kind) => {
                for path in &event.paths {
                    if let Some(group) = rules.classify(path) {
                        debug!("watch"; "{:?}: {}", group, path.display());
                        debouncer.record(group, Instant::now());
                    }
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for group in debouncer.take_ready(Instant::now()) {
            let message = rebuild(config, group);
            reload.broadcast(&message);
        }
    }

    debug!("watch"; "stopped");
    Ok(())
}

/// Rebuild what `group` needs and decide what browsers should do.
pub fn rebuild(config: &Config, group: WatchGroup) -> ReloadMessage {
    match group {
        WatchGroup::Styles => match build_styles(config) {
            Ok(_) => {
                status_success("css:compile");
                ReloadMessage::Css {
                    href: config.styles.output.to_string_lossy().replace('\\', "/"),
                }
            }
            Err(e) => failure(config, "css:compile", &config.styles.entry, &e),
        },
        WatchGroup::Scripts => match build_scripts(config) {
            Ok(_) => {
                status_success("js:compile");
                ReloadMessage::Reload
            }
            Err(e) => failure(config, "js:compile", &config.scripts.entry, &e),
        },
        WatchGroup::Markup => {
            status_success("reload");
            ReloadMessage::Reload
        }
    }
}

fn failure(config: &Config, stage: &str, entry: &Path, error: &anyhow::Error) -> ReloadMessage {
    let path = match error.downcast_ref::<BuildError>() {
        Some(BuildError::Compile { location, .. }) => location.path.clone(),
        _ => config.source_dir().join(entry),
    };
    let detail = format!("{error:#}");
    status_error(&format!("{stage} failed"), &detail);
    ReloadMessage::Error {
        path: path.display().to_string(),
        error: detail,
    }
}
