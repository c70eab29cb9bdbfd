//! Error Types
//!
//! Typed errors for the two failure families callers need to tell apart:
//! configuration problems (reported as usage errors) and per-session relay
//! failures (logged and contained to the session).

use std::time::Duration;
use thiserror::Error;

use crate::relay::Direction;

/// Boxed transport error from either side of a session
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors. All of them are usage errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("{present} is set but {missing} is not; TLS needs both")]
    PartialTls {
        present: &'static str,
        missing: &'static str,
    },

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures that end a single relay session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to target {url}: {source}")]
    Dial {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("timed out connecting to target {url} after {timeout:?}")]
    DialTimeout { url: String, timeout: Duration },

    #[error("{direction} read failed: {source}")]
    Read {
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("{direction} write failed: {source}")]
    Write {
        direction: Direction,
        #[source]
        source: BoxError,
    },
}

impl SessionError {
    /// Short name of the relay phase the error belongs to, used as a log field
    pub fn phase(&self) -> &'static str {
        match self {
            SessionError::Dial { .. } | SessionError::DialTimeout { .. } => "dial",
            SessionError::Read { .. } | SessionError::Write { .. } => "forward",
        }
    }
}
