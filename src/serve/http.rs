//! HTTP side of the dev server: path resolution, responses, request loop.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use super::reload::{CLIENT_PATH, client_script};
use crate::core::is_shutdown;
use crate::log;
use crate::utils::mime::{self, types};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Request handler threads.
const REQUEST_THREADS: usize = 4;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = String::new();

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error
    ))
}

/// Serve requests until the server is unblocked.
pub fn run_request_loop(server: &Server, roots: Vec<PathBuf>, ws_port: Option<u16>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("failed to create request thread pool")?;
    let roots = Arc::new(roots);

    for request in server.incoming_requests() {
        let roots = Arc::clone(&roots);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &roots, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(request: Request, roots: &[PathBuf], ws_port: Option<u16>) -> Result<()> {
    if is_shutdown() {
        return send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec());
    }

    if let Some(port) = ws_port
        && request.url() == CLIENT_PATH
    {
        return send_body(request, 200, types::JAVASCRIPT, client_script(port).into_bytes());
    }

    match resolve_path(request.url(), roots) {
        Some(path) => respond_file(request, &path, ws_port),
        None => send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec()),
    }
}

/// Resolve a request URL against the serve roots.
///
/// The first root containing the path wins. Directories resolve to their
/// `index.html`. Anything escaping a root (`..`, symlinks) resolves to nothing.
pub fn resolve_path(url: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let clean = normalize_url(url);
    if Path::new(&clean)
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return None;
    }

    roots.iter().find_map(|root| resolve_in(root, &clean))
}

fn resolve_in(root: &Path, clean: &str) -> Option<PathBuf> {
    let canonical = root.join(clean).canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;

    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decode, strip query string and fragment, trim slashes.
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

fn respond_file(request: Request, path: &Path, ws_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);

    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(200))
            .with_header(header("Content-Type", content_type)?);
        request.respond(response)?;
        return Ok(());
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = match ws_port {
        Some(_) if content_type == types::HTML => inject_reload_script(&body),
        _ => body,
    };
    send_body(request, 200, content_type, body)
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header {key}: {value}"))
}

/// Insert the reload client tag before the last `</body>`, or append it.
pub fn inject_reload_script(content: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";
    let tag = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
    let tag = tag.as_bytes();

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + tag.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(tag);
    result.extend_from_slice(&content[pos..]);
    result
}
