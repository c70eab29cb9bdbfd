//! Configuration Manager

use super::{Config, ServerConfig, TargetConfig, TlsConfig, DEFAULT_DIAL_TIMEOUT};
use crate::error::ConfigError;
use clap::Args;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const TARGET_HOST_VAR: &str = "TARGET_URL";
pub const TARGET_PORT_VAR: &str = "TARGET_PORT";
pub const LISTEN_PORT_VAR: &str = "SERVER_PORT";
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY_PATH";
pub const CERTIFICATE_VAR: &str = "CERTIFICATE_PATH";
pub const BIND_HOST_VAR: &str = "RELAY_BIND_HOST";
pub const DIAL_TIMEOUT_VAR: &str = "RELAY_DIAL_TIMEOUT";
pub const UPSTREAM_CA_VAR: &str = "RELAY_UPSTREAM_CA_PATH";

/// Usage line printed when required settings are missing
pub const USAGE: &str = "Usage: TARGET_URL=your-target-server-host TARGET_PORT=your-target-server-port \
SERVER_PORT=9002 [PRIVATE_KEY_PATH=private-key.pem CERTIFICATE_PATH=certificate.pem] wsrelay";

/// Raw startup settings, each readable from a flag or its environment variable
#[derive(Args, Debug, Clone, Default)]
pub struct RelaySettings {
    /// Host the relay dials for every session
    #[arg(long, env = TARGET_HOST_VAR)]
    pub target_host: Option<String>,

    /// Port the relay dials for every session
    #[arg(long, env = TARGET_PORT_VAR)]
    pub target_port: Option<String>,

    /// Port the relay listens on
    #[arg(long, env = LISTEN_PORT_VAR)]
    pub listen_port: Option<String>,

    /// Private key for inbound TLS (requires --certificate)
    #[arg(long, env = PRIVATE_KEY_VAR)]
    pub private_key: Option<String>,

    /// Certificate chain for inbound TLS (requires --private-key)
    #[arg(long, env = CERTIFICATE_VAR)]
    pub certificate: Option<String>,

    /// Interface the listener binds to
    #[arg(long, env = BIND_HOST_VAR)]
    pub bind_host: Option<String>,

    /// Upper bound on the outbound dial (e.g. 10s, 1m)
    #[arg(long, env = DIAL_TIMEOUT_VAR)]
    pub dial_timeout: Option<String>,

    /// Extra PEM trust anchors for wss dials
    #[arg(long, env = UPSTREAM_CA_VAR)]
    pub upstream_ca: Option<String>,
}

/// Turns raw settings into a validated, immutable [`Config`]
pub struct ConfigManager;

impl ConfigManager {
    /// Build the configuration. Empty values count as absent.
    pub fn build(settings: &RelaySettings) -> Result<Config, ConfigError> {
        let target_host = required(&settings.target_host, TARGET_HOST_VAR)?;
        let target_port = parse_port(required(&settings.target_port, TARGET_PORT_VAR)?, TARGET_PORT_VAR)?;
        let listen_port = parse_port(required(&settings.listen_port, LISTEN_PORT_VAR)?, LISTEN_PORT_VAR)?;

        let tls = match (present(&settings.private_key), present(&settings.certificate)) {
            (Some(key), Some(cert)) => Some(TlsConfig {
                certificate_path: PathBuf::from(cert),
                private_key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::PartialTls {
                    present: PRIVATE_KEY_VAR,
                    missing: CERTIFICATE_VAR,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::PartialTls {
                    present: CERTIFICATE_VAR,
                    missing: PRIVATE_KEY_VAR,
                })
            }
        };

        let bind_ip = match present(&settings.bind_host) {
            Some(host) => host.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                name: BIND_HOST_VAR,
                value: host.to_string(),
                reason: e.to_string(),
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let dial_timeout = match present(&settings.dial_timeout) {
            Some(value) => parse_timeout(value)?,
            None => DEFAULT_DIAL_TIMEOUT,
        };

        Ok(Config {
            target: TargetConfig {
                host: target_host.to_string(),
                port: target_port,
                dial_timeout,
                ca_path: present(&settings.upstream_ca).map(PathBuf::from),
            },
            server: ServerConfig {
                bind_addr: SocketAddr::new(bind_ip, listen_port),
            },
            tls,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    present(value).ok_or(ConfigError::Missing(name))
}

fn parse_port(value: &str, name: &'static str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|e| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let timeout = humantime::parse_duration(value).map_err(|e| ConfigError::Invalid {
        name: DIAL_TIMEOUT_VAR,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if timeout.is_zero() {
        return Err(ConfigError::Invalid {
            name: DIAL_TIMEOUT_VAR,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(timeout)
}
