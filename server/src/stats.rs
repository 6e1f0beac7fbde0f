//! Server-wide counters.
//!
//! Written by the dispatcher (single writer) and the socket tasks (error
//! counter only), read by the `/admin/stats` endpoint. Relaxed atomics are
//! enough for that split — readers only ever see a slightly stale snapshot.

use std::sync::atomic::AtomicU64;

use crate::time::now_secs;

/// Counters and gauges for one server instance
#[derive(Debug)]
pub struct ServerStats {
    started_at: u64,
    /// Connections accepted over the lifetime of the process
    pub total_connections: AtomicU64,
    /// Frames dispatched to a protocol handler
    pub total_messages: AtomicU64,
    /// Parse failures, unknown events, dropped frames, refused accepts
    pub total_errors: AtomicU64,
    /// Rooms created over the lifetime of the process
    pub total_rooms_created: AtomicU64,
    /// Currently live clients
    pub active_clients: AtomicU64,
    /// Currently allocated rooms
    pub active_rooms: AtomicU64,
}

impl ServerStats {
    /// Fresh counters stamped with the current time
    pub fn new() -> Self {
        Self {
            started_at: now_secs(),
            total_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_rooms_created: AtomicU64::new(0),
            active_clients: AtomicU64::new(0),
            active_rooms: AtomicU64::new(0),
        }
    }

    /// Seconds since the server started
    pub fn uptime_secs(&self) -> u64 {
        now_secs().saturating_sub(self.started_at)
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
