//! wsrelay - WebSocket Relay
//!
//! Accepts WebSocket clients, dials a fixed target for each one and forwards
//! frames in both directions until either side disconnects.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsrelay::{
    config::{manager::USAGE, ConfigManager, RelaySettings},
    shutdown, ConnectionManager,
};

/// CLI arguments for wsrelay
#[derive(Parser, Debug)]
#[command(name = "wsrelay")]
#[command(about = "wsrelay - WebSocket relay with optional TLS termination")]
#[command(version)]
#[command(long_about = "
wsrelay - WebSocket relay with optional TLS termination

Every client that upgrades on / gets its own connection to
ws://TARGET_URL:TARGET_PORT/ (wss:// when TLS is enabled) and frames are
copied both ways until either side closes.

Environment variables (each also available as a flag):
  TARGET_URL             - Target host (required)
  TARGET_PORT            - Target port (required)
  SERVER_PORT            - Listen port (required)
  PRIVATE_KEY_PATH       - TLS private key (requires CERTIFICATE_PATH)
  CERTIFICATE_PATH       - TLS certificate (requires PRIVATE_KEY_PATH)
  RELAY_BIND_HOST        - Listen interface (default 0.0.0.0)
  RELAY_DIAL_TIMEOUT     - Outbound dial timeout (default 45s)
  RELAY_UPSTREAM_CA_PATH - Extra PEM roots trusted for wss dials
  RELAY_LOG_LEVEL        - Log level when RUST_LOG is unset (default info)
")]
pub struct CliArgs {
    #[command(flatten)]
    pub settings: RelaySettings,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RELAY_LOG_LEVEL", default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize tracing
    init_tracing(&args)?;

    let config = match ConfigManager::build(&args.settings) {
        Ok(config) => config,
        Err(e) => {
            println!("{}", USAGE);
            println!("Error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting wsrelay v{}", env!("CARGO_PKG_VERSION"));

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Listen address: {}", config.server.bind_addr);
        info!("  Target: {}", config.target_url());
        info!("  Dial timeout: {}", humantime::format_duration(config.target.dial_timeout));
        info!("  TLS: {}", if config.tls_enabled() { "enabled" } else { "disabled" });
        return Ok(());
    }

    let mut connection_manager = match ConnectionManager::new(Arc::new(config)) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to initialize relay: {:#}", e);
            return Err(e);
        }
    };

    if let Err(e) = connection_manager.bind().await {
        error!("Failed to start listener: {:#}", e);
        return Err(e);
    }

    tokio::select! {
        result = connection_manager.start() => {
            if let Err(e) = result {
                error!("Server error: {:#}", e);
                return Err(e);
            }
        }
        result = shutdown::wait_for_signal() => {
            if let Err(e) = result {
                error!("Error setting up signal handlers: {}", e);
                return Err(e);
            }
        }
    }

    info!("Relay stopped");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
