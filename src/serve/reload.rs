//! Reload channel: a WebSocket server that pushes rebuild results to every
//! connected browser.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"reload"}
//! {"type":"css","href":"css/index.css"}
//! {"type":"error","path":"app/js/index.js","error":"..."}
//! ```

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use serde::Serialize;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// URL the injected client script is served from.
pub const CLIENT_PATH: &str = "/__sitepipe/reload.js";

/// Browser side of the channel. `__WS_PORT__` is substituted at serve time.
const CLIENT_JS: &str = r#"(function () {
  var url = "ws://" + (location.hostname || "localhost") + ":__WS_PORT__";
  var overlay = null;

  function clearError() {
    if (overlay) { overlay.remove(); overlay = null; }
  }

  function showError(path, error) {
    clearError();
    overlay = document.createElement("pre");
    overlay.style.cssText = "position:fixed;inset:auto 0 0 0;max-height:50%;overflow:auto;margin:0;padding:1em;background:#300;color:#fdd;font:12px/1.4 monospace;z-index:2147483647";
    overlay.textContent = path + "\n\n" + error;
    document.body.appendChild(overlay);
  }

  function swapStylesheet(href) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {
      var current = links[i].getAttribute("href") || "";
      if (current.split("?")[0].replace(/^\.?\//, "") === href) {
        links[i].setAttribute("href", href + "?v=" + Date.now());
      }
    }
  }

  function connect() {
    var ws = new WebSocket(url);
    ws.onmessage = function (event) {
      var msg = JSON.parse(event.data);
      if (msg.type === "reload") {
        location.reload();
      } else if (msg.type === "css") {
        clearError();
        swapStylesheet(msg.href);
      } else if (msg.type === "error") {
        console.error("[sitepipe] " + msg.path + ": " + msg.error);
        showError(msg.path, msg.error);
      }
    };
    ws.onclose = function () { setTimeout(connect, 1000); };
  }

  connect();
})();
"#;

/// Client script with the actual WebSocket port filled in.
pub fn client_script(ws_port: u16) -> String {
    CLIENT_JS.replace("__WS_PORT__", &ws_port.to_string())
}

/// A message pushed to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Reload the whole page.
    Reload,
    /// Re-fetch one stylesheet in place.
    Css { href: String },
    /// A rebuild failed; nothing was reloaded.
    Error { path: String, error: String },
}

impl ReloadMessage {
    pub fn to_json(&self) -> String {
        // plain strings only, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Connected browsers. Cheap to clone; clones share the client list.
#[derive(Clone)]
pub struct ReloadServer {
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
    port: u16,
}

impl ReloadServer {
    /// Bind `interface:base_port` (or the next free port) and accept clients
    /// on a background thread.
    pub fn start(interface: IpAddr, base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(interface, base_port)?;
        let server = Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            port,
        };

        let clients = Arc::clone(&server.clients);
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream.map_err(anyhow::Error::from).and_then(|s| {
                    tungstenite::accept(s).map_err(|e| anyhow!("handshake failed: {e}"))
                }) {
                    Ok(ws) => {
                        let mut clients = clients.lock();
                        clients.push(ws);
                        debug!("reload"; "client connected (total: {})", clients.len());
                    }
                    Err(e) => debug!("reload"; "{e}"),
                }
            }
        });

        debug!("reload"; "ws://{}", SocketAddr::new(interface, port));
        Ok(server)
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Send `message` to every client, dropping the ones that went away.
    /// Returns the number of clients reached.
    pub fn broadcast(&self, message: &ReloadMessage) -> usize {
        let text = message.to_json();
        let mut clients = self.clients.lock();
        clients.retain_mut(|ws| match ws.send(Message::Text(text.clone().into())) {
            Ok(()) => true,
            Err(e) => {
                debug!("reload"; "dropping client: {e}");
                false
            }
        });
        debug!("reload"; "{} -> {} client(s)", text, clients.len());
        clients.len()
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                if offset > 0 {
                    log!("reload"; "port {base_port} in use, using {actual_port} instead");
                }
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind reload server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
