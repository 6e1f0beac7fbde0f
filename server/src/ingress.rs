//! Bounded ingress queue between the socket tasks and the dispatcher.
//!
//! Socket tasks produce; the dispatcher is the single consumer. Events for
//! one connection arrive in delivery order because they all travel the same
//! channel. Frames are pushed without blocking and dropped when the queue is
//! full; connection lifecycle events wait for space so they are never lost.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use parley_protocol::Envelope;

use crate::clients::ConnId;
use crate::stats::ServerStats;
use crate::time::now_millis;

/// Everything the dispatcher consumes
#[derive(Debug)]
pub enum SessionEvent {
    /// A socket finished the upgrade; `sender` is its outbound channel
    Connected {
        conn: ConnId,
        sender: mpsc::Sender<String>,
    },
    /// A parsed text frame from a connection
    Frame {
        conn: ConnId,
        envelope: Envelope,
        enqueued_ms: u64,
    },
    /// The socket is gone
    Closed { conn: ConnId },
}

/// Producer half of the ingress queue, cloned into every socket task
#[derive(Debug, Clone)]
pub struct Ingress {
    tx: mpsc::Sender<SessionEvent>,
    stats: Arc<ServerStats>,
}

impl Ingress {
    /// Create the queue; the receiver goes to the dispatcher
    pub fn channel(capacity: usize, stats: Arc<ServerStats>) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, stats }, rx)
    }

    /// Announce a new connection, handing over its outbound sender
    pub async fn connected(&self, conn: ConnId, sender: mpsc::Sender<String>) {
        let _ = self.tx.send(SessionEvent::Connected { conn, sender }).await;
    }

    /// Enqueue a frame. Never blocks; a full queue drops the frame and
    /// counts it against the server error counter.
    pub fn push_frame(&self, conn: ConnId, envelope: Envelope) -> bool {
        let event = SessionEvent::Frame {
            conn,
            envelope,
            enqueued_ms: now_millis(),
        };
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("Ingress queue full, dropping frame from connection {}", conn);
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Announce a closed connection
    pub async fn closed(&self, conn: ConnId) {
        let _ = self.tx.send(SessionEvent::Closed { conn }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_full_queue_drops_frames_and_counts() {
        let stats = Arc::new(ServerStats::new());
        let (ingress, _rx) = Ingress::channel(1, stats.clone());

        assert!(ingress.push_frame(1, Envelope::new("leave-room", Value::Null)));
        assert!(!ingress.push_frame(1, Envelope::new("leave-room", Value::Null)));
        assert_eq!(stats.total_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_frames_carry_enqueue_timestamp() {
        let stats = Arc::new(ServerStats::new());
        let (ingress, mut rx) = Ingress::channel(4, stats);

        ingress.push_frame(7, Envelope::new("leave-room", Value::Null));
        match rx.try_recv().expect("queued frame") {
            SessionEvent::Frame {
                conn, enqueued_ms, ..
            } => {
                assert_eq!(conn, 7);
                assert!(enqueued_ms > 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
