//! Development server with live reload.
//!
//! Serves the source tree (then the vendor tree) as-is. With `watch`
//! enabled, edits recompile in the background and a WebSocket channel tells
//! open pages to patch stylesheets or reload.

mod http;
mod reload;
mod watch;

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam::channel;

use crate::compiler::{build_scripts, build_styles};
use crate::config::Config;
use crate::core::register_server;
use crate::{debug, log};
use http::bind_with_retry;
use reload::ReloadServer;

/// Compile once, then serve until Ctrl+C.
pub fn serve(config: &Config) -> Result<()> {
    initial_build(config);

    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let reload = if config.serve.watch {
        Some(ReloadServer::start(config.serve.interface, config.serve.ws_port)?)
    } else {
        None
    };
    let ws_port = reload.as_ref().map(ReloadServer::port);

    let watcher = reload.map(|reload| {
        let config = config.clone();
        thread::spawn(move || {
            if let Err(e) = watch::run_watch_loop(&config, &reload, &shutdown_rx) {
                log!("watch"; "{e:#}");
            }
        })
    });

    log!("serve"; "http://{}", addr);
    let roots = vec![config.source_dir(), config.vendor_dir()];
    http::run_request_loop(&server, roots, ws_port)?;

    if let Some(handle) = watcher {
        let _ = handle.join();
    }
    debug!("serve"; "stopped");
    Ok(())
}

/// `css:compile` and `js:compile` before the first request. Failures are
/// reported but do not stop the server; the next edit retries.
fn initial_build(config: &Config) {
    let (styles, scripts) = rayon::join(|| build_styles(config), || build_scripts(config));
    for (stage, result) in [("css:compile", styles), ("js:compile", scripts)] {
        match result {
            Ok(artifact) => debug!(stage; "{}", artifact.path.display()),
            Err(e) => log!("error"; "{stage} failed: {e:#}"),
        }
    }
}
