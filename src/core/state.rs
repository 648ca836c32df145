//! Process-wide interrupt state.
//!
//! The first Ctrl+C requests a stop: a pipeline run finishes the layer in
//! flight and skips the rest, the dev server stops accepting requests and
//! wakes its watch loop. A second Ctrl+C exits immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use tiny_http::Server;

/// Exit status for an interrupted process (128 + SIGINT).
pub const INTERRUPTED_EXIT: u8 = 130;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Dev server to unblock, if one is running.
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Wakes the watch loop.
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Install the Ctrl+C handler. Call once, before any stage runs.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(i32::from(INTERRUPTED_EXIT));
        }

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        match SERVER.get() {
            Some(server) => {
                crate::log!("serve"; "shutting down...");
                server.unblock();
            }
            None => crate::log!("run"; "interrupted, finishing current stages (Ctrl+C again to abort)"),
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Let the handler stop the dev server. Call after binding, before the
/// request loop.
pub fn register_server(server: Arc<Server>, shutdown_tx: Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
