//! Configuration Types

use std::net::{Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on the outbound dial, matching a stock WebSocket dialer
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(45);

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub target: TargetConfig,
    pub server: ServerConfig,
    /// Present iff inbound TLS termination (and `wss` dialing) is enabled
    pub tls: Option<TlsConfig>,
}

/// Outbound target configuration
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub dial_timeout: Duration,
    /// Extra PEM trust anchors for `wss` dials
    pub ca_path: Option<PathBuf>,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

/// Inbound TLS material
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
}

impl Config {
    /// Whether TLS is enabled on both the listener and the dial
    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Scheme used for the outbound dial
    pub fn target_scheme(&self) -> &'static str {
        if self.tls_enabled() {
            "wss"
        } else {
            "ws"
        }
    }

    /// Full URL the relay dials for every session
    pub fn target_url(&self) -> String {
        let host = &self.target.host;
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("{}://[{}]:{}/", self.target_scheme(), host, self.target.port)
        } else {
            format!("{}://{}:{}/", self.target_scheme(), host, self.target.port)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig {
                host: "127.0.0.1".to_string(),
                port: 80,
                dial_timeout: DEFAULT_DIAL_TIMEOUT,
                ca_path: None,
            },
            server: ServerConfig {
                bind_addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            },
            tls: None,
        }
    }
}
