//! wsrelay Library
//! 
//! WebSocket relay: accepts a client WebSocket, opens a matching connection to
//! a fixed target and forwards frames unmodified in both directions until
//! either side goes away. Inbound TLS termination is optional.

pub mod config;
pub mod connection;
pub mod error;
pub mod relay;
pub mod shutdown;
pub mod tls;

pub use config::Config;
pub use connection::ConnectionManager;
pub use relay::RelayEngine;

/// Common error type for the relay
pub type Result<T> = anyhow::Result<T>;
