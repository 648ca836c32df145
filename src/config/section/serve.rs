//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 3000                 # HTTP port number
//! ws_port = 35729             # Reload channel (WebSocket) port
//! watch = true                # Recompile and reload on file changes
//! debounce_ms = 300           # Quiet period before a watch group rebuilds
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Development server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Interface for both the HTTP server and the reload channel.
    pub interface: IpAddr,
    /// First HTTP port tried.
    pub port: u16,
    /// First reload channel port tried.
    pub ws_port: u16,
    pub watch: bool,
    /// Quiet period per watch group.
    pub debounce_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3000,
            ws_port: 35729,
            watch: true,
            debounce_ms: 300,
        }
    }
}

impl ServeConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv6Addr};
    use std::time::Duration;

    use crate::config::test_parse_config;

    #[test]
    fn test_serve_defaults() {
        let serve = test_parse_config("").serve;
        assert!(serve.interface.is_loopback());
        assert_eq!((serve.port, serve.ws_port), (3000, 35729));
        assert_eq!(serve.debounce(), Duration::from_millis(300));
        assert!(serve.watch);
    }

    #[test]
    fn test_serve_overrides() {
        let serve = test_parse_config(
            "[serve]\ninterface = \"::1\"\nws_port = 40000\ndebounce_ms = 50\nwatch = false",
        )
        .serve;
        assert_eq!(serve.interface, IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(serve.ws_port, 40000);
        assert_eq!(serve.debounce(), Duration::from_millis(50));
        assert_eq!(serve.port, 3000);
        assert!(!serve.watch);
    }
}
