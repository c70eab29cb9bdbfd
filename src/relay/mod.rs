//! Relay Module
//! 
//! Upgrades client requests, dials the target and relays frames between the two.

pub mod engine;
pub mod frame;
pub mod handler;
pub mod session;

pub use engine::{RelayEngine, UpstreamSocket};
pub use frame::{CloseReason, Frame};
pub use handler::create_router;
pub use session::{ConnectionStats, Direction, RelaySession};
