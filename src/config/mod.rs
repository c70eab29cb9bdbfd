//! Configuration Module
//! 
//! Builds the immutable relay configuration from startup settings.

pub mod manager;
pub mod types;

pub use manager::{ConfigManager, RelaySettings};
pub use types::*;
