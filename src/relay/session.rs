//! Relay Session

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Direction a frame travels through the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to target
    Upstream,
    /// Target to client
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => f.write_str("client->target"),
            Direction::Downstream => f.write_str("target->client"),
        }
    }
}

/// Represents an active relay session
#[derive(Debug)]
pub struct RelaySession {
    pub session_id: String,
    pub client_addr: SocketAddr,
    pub target_url: String,
    pub start_time: Instant,
    frames_up: AtomicU64,
    frames_down: AtomicU64,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
}

/// Connection statistics for completed sessions
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub session_id: String,
    pub client_addr: SocketAddr,
    pub target_url: String,
    pub duration: Duration,
    pub frames_up: u64,
    pub frames_down: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
}

impl RelaySession {
    /// Create a new relay session
    pub fn new(session_id: String, client_addr: SocketAddr, target_url: String) -> Self {
        debug!("Creating new relay session: {} ({} -> {})",
               session_id, client_addr, target_url);

        Self {
            session_id,
            client_addr,
            target_url,
            start_time: Instant::now(),
            frames_up: AtomicU64::new(0),
            frames_down: AtomicU64::new(0),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
        }
    }

    /// Account for a frame of `len` payload bytes forwarded in `direction`
    pub fn record(&self, direction: Direction, len: usize) {
        let (frames, bytes) = match direction {
            Direction::Upstream => (&self.frames_up, &self.bytes_up),
            Direction::Downstream => (&self.frames_down, &self.bytes_down),
        };
        frames.fetch_add(1, Ordering::Relaxed);
        bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Frames forwarded client to target
    pub fn frames_up(&self) -> u64 {
        self.frames_up.load(Ordering::Relaxed)
    }

    /// Frames forwarded target to client
    pub fn frames_down(&self) -> u64 {
        self.frames_down.load(Ordering::Relaxed)
    }

    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generate connection statistics
    pub fn to_stats(&self) -> ConnectionStats {
        ConnectionStats {
            session_id: self.session_id.clone(),
            client_addr: self.client_addr,
            target_url: self.target_url.clone(),
            duration: self.duration(),
            frames_up: self.frames_up(),
            frames_down: self.frames_down(),
            bytes_up: self.bytes_up(),
            bytes_down: self.bytes_down(),
        }
    }

    /// Log session statistics
    pub fn log_stats(&self) {
        info!(
            session_id = %self.session_id,
            client_addr = %self.client_addr,
            target_url = %self.target_url,
            duration_ms = self.duration().as_millis() as u64,
            frames_up = self.frames_up(),
            frames_down = self.frames_down(),
            bytes_up = self.bytes_up(),
            bytes_down = self.bytes_down(),
            "Relay session completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_per_direction() {
        let session = RelaySession::new(
            "test_session".to_string(),
            "127.0.0.1:12345".parse().unwrap(),
            "ws://127.0.0.1:80/".to_string(),
        );

        session.record(Direction::Upstream, 4);
        session.record(Direction::Upstream, 10);
        session.record(Direction::Downstream, 5);

        assert_eq!(session.frames_up(), 2);
        assert_eq!(session.bytes_up(), 14);
        assert_eq!(session.frames_down(), 1);
        assert_eq!(session.bytes_down(), 5);

        let stats = session.to_stats();
        assert_eq!(stats.session_id, "test_session");
        assert_eq!(stats.target_url, "ws://127.0.0.1:80/");
        assert_eq!(stats.frames_up, 2);
        assert_eq!(stats.bytes_down, 5);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Upstream.to_string(), "client->target");
        assert_eq!(Direction::Downstream.to_string(), "target->client");
    }
}
