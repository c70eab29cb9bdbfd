//! Connection Management Module
//! 
//! Handles TCP connection acceptance, TLS termination and HTTP serving.

pub mod manager;

pub use manager::ConnectionManager;
