//! The dispatcher: single consumer of the ingress queue and sole mutator of
//! both registries.
//!
//! Protocol handlers never block and never fail the loop — every error is
//! answered (or counted) locally and the next event is picked up. Once every
//! ten seconds a reaper pass evicts idle clients and frees drained rooms.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use parley_protocol::events::{
    EVENT_ANSWER, EVENT_CLIENT_ID, EVENT_ERROR, EVENT_ICE_CANDIDATE, EVENT_JOIN_ROOM,
    EVENT_LEAVE_ROOM, EVENT_OFFER, EVENT_PARTICIPANTS, EVENT_ROOM_CREATED,
};
use parley_protocol::Envelope;

use crate::clients::{ClientRegistry, ClientState, ConnId};
use crate::config::ServerConfig;
use crate::ingress::SessionEvent;
use crate::rooms::{JoinError, RoomRegistry, MAX_PARTICIPANTS};
use crate::stats::ServerStats;
use crate::time::{now_millis, now_secs};

/// Seconds between reaper passes
const REAP_INTERVAL_SECS: u64 = 10;

/// Room name used when a join does not provide one
const DEFAULT_ROOM_NAME: &str = "Unnamed Room";

/// Owns the registries and drives the signaling state machine
pub struct Dispatcher {
    pub clients: ClientRegistry,
    pub rooms: RoomRegistry,
    client_timeout_secs: u64,
    stats: Arc<ServerStats>,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig, stats: Arc<ServerStats>) -> Self {
        Self {
            clients: ClientRegistry::new(config.max_clients),
            rooms: RoomRegistry::new(config.max_rooms),
            client_timeout_secs: config.client_timeout_secs,
            stats,
        }
    }

    /// Drive the event loop until shutdown is signalled or every producer is
    /// gone. Dropping `self` afterwards releases all outbound senders, which
    /// closes any remaining sockets.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut reap_timer = tokio::time::interval(Duration::from_secs(REAP_INTERVAL_SECS));
        reap_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        reap_timer.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = reap_timer.tick() => self.reap(),
                changed = shutdown.changed() => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        info!("Dispatcher shutting down");
                        break;
                    }
                    Ok(()) => {}
                    // Shutdown handle dropped; nothing is left to signal us
                    Err(_) => break,
                },
            }
        }
    }

    /// Apply one session event. Public so tests can drive the dispatcher
    /// without a socket in the loop.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { conn, sender } => self.on_connected(conn, sender),
            SessionEvent::Frame {
                conn,
                envelope,
                enqueued_ms,
            } => self.on_frame(conn, envelope, enqueued_ms),
            SessionEvent::Closed { conn } => self.on_closed(conn),
        }
        self.publish_gauges();
    }

    fn on_connected(&mut self, conn: ConnId, sender: mpsc::Sender<String>) {
        self.stats.total_connections.fetch_add(1, Ordering::Relaxed);
        let Some(index) = self.clients.add(conn, sender) else {
            warn!(
                "Client registry full ({} slots), refusing connection {}",
                self.clients.capacity(),
                conn
            );
            self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
            return; // dropping the sender closes the socket
        };

        let client_id = match self.clients.get(index) {
            Some(client) => client.id.clone(),
            None => return,
        };
        info!(
            "Client {} connected ({} active)",
            client_id,
            self.clients.active_count()
        );
        self.send_to(index, EVENT_CLIENT_ID, json!({ "clientId": client_id }));
    }

    fn on_closed(&mut self, conn: ConnId) {
        let Some(index) = self.clients.index_of(conn) else {
            debug!("Close for unknown connection {}", conn);
            return;
        };
        self.remove_client(index, "disconnected");
    }

    /// Tear a client down: implicit room leave, then slot release. Used for
    /// socket close and reaper eviction alike.
    fn remove_client(&mut self, index: usize, reason: &str) {
        self.handle_leave_room(index);
        if let Some(client) = self.clients.remove(index) {
            info!(
                "Client {} {} ({} active)",
                client.id,
                reason,
                self.clients.active_count()
            );
        }
    }

    fn on_frame(&mut self, conn: ConnId, envelope: Envelope, enqueued_ms: u64) {
        let Some(index) = self.clients.index_of(conn) else {
            // Frames can race a close; there is nothing to route them to
            debug!("Dropping frame from unknown connection {}", conn);
            return;
        };

        self.stats.total_messages.fetch_add(1, Ordering::Relaxed);
        if let Some(client) = self.clients.get_mut(index) {
            client.touch();
            client.messages_received += 1;
        }
        trace!(
            "Dispatching '{}' after {} ms in queue",
            envelope.event,
            now_millis().saturating_sub(enqueued_ms)
        );

        let Envelope { event, data } = envelope;
        match event.as_str() {
            EVENT_JOIN_ROOM => self.handle_join_room(index, &data),
            EVENT_LEAVE_ROOM => self.handle_leave_room(index),
            EVENT_OFFER => self.handle_signal(index, EVENT_OFFER, "offer", &data),
            EVENT_ANSWER => self.handle_signal(index, EVENT_ANSWER, "answer", &data),
            EVENT_ICE_CANDIDATE => self.handle_signal(index, EVENT_ICE_CANDIDATE, "candidate", &data),
            other => {
                warn!("Unknown event '{}'", other);
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Join an existing room by id, or create one. A client already in a
    /// room leaves it first, exactly as if it had sent `leave-room`.
    fn handle_join_room(&mut self, index: usize, data: &Value) {
        let requested_id = data
            .get("roomId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let room_name = data
            .get("roomName")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ROOM_NAME)
            .to_owned();

        self.handle_leave_room(index);
        if let Some(client) = self.clients.get_mut(index) {
            client.state = ClientState::Joining;
        }

        let existing = requested_id
            .as_deref()
            .and_then(|id| self.rooms.find_by_id(id));
        let room_index = match existing {
            Some(room_index) => room_index,
            None => {
                let Some(room_index) = self.rooms.create(&room_name, index) else {
                    warn!("Room registry full ({} slots)", self.rooms.capacity());
                    if let Some(client) = self.clients.get_mut(index) {
                        client.state = ClientState::Connected;
                    }
                    self.send_error(index, "Cannot create room");
                    return;
                };
                self.stats.total_rooms_created.fetch_add(1, Ordering::Relaxed);

                let (room_id, name) = match self.rooms.get(room_index) {
                    Some(room) => (room.id.clone(), room.name.clone()),
                    None => return,
                };
                info!("Room {} ({}) created ({} active)", room_id, name, self.rooms.active_count());
                self.send_to(
                    index,
                    EVENT_ROOM_CREATED,
                    json!({ "roomId": room_id, "roomName": name }),
                );
                room_index
            }
        };

        let seated = match (self.rooms.get_mut(room_index), self.clients.get_mut(index)) {
            (Some(room), Some(client)) => room.add_participant(client, index, room_index),
            _ => return,
        };
        match seated {
            Ok(()) => self.broadcast_participants(room_index),
            Err(JoinError::AlreadyInRoom) => {
                // Re-seating the same room is a no-op; refresh the
                // back-reference and tell everyone where things stand
                if let Some(client) = self.clients.get_mut(index) {
                    client.current_room = Some(room_index);
                    client.state = ClientState::InRoom;
                }
                self.broadcast_participants(room_index);
            }
            Err(JoinError::RoomFull) | Err(JoinError::InOtherRoom) => {
                if let Some(client) = self.clients.get_mut(index) {
                    client.state = ClientState::Connected;
                }
                self.send_error(
                    index,
                    &format!("Room is full (max {MAX_PARTICIPANTS} participants)"),
                );
            }
        }
    }

    /// Explicit leave, and the implicit leave run by joins and disconnects.
    /// Quietly does nothing when the client is not in a room. The leaver is
    /// never messaged; survivors get a fresh participant list, unless the
    /// room drained (the reaper frees it and nobody is left to care).
    fn handle_leave_room(&mut self, index: usize) {
        let Some(room_index) = self.clients.get(index).and_then(|c| c.current_room) else {
            return;
        };

        let removed = match (self.rooms.get_mut(room_index), self.clients.get_mut(index)) {
            (Some(room), Some(client)) => room.remove_participant(client, index),
            _ => false,
        };
        if !removed {
            // Stale back-reference; drop it
            if let Some(client) = self.clients.get_mut(index) {
                client.current_room = None;
                client.state = ClientState::Connected;
            }
            return;
        }

        let occupied = self
            .rooms
            .get(room_index)
            .map(|room| !room.is_empty())
            .unwrap_or(false);
        if occupied {
            self.broadcast_participants(room_index);
        }
    }

    /// Shared routing for offer / answer / ice-candidate. `payload_key`
    /// names the field carried through verbatim to the target.
    fn handle_signal(&mut self, index: usize, event: &str, payload_key: &str, data: &Value) {
        let Some(room_index) = self.clients.get(index).and_then(|c| c.current_room) else {
            self.send_error(index, "Not in a room");
            return;
        };

        let target_id = data
            .get("targetClientId")
            .and_then(Value::as_str)
            .unwrap_or("");
        if target_id.is_empty() {
            self.send_error(index, "Missing target client ID");
            return;
        }

        // Cross-room relay is forbidden: the target must share the sender's room
        let Some(target_index) = self.find_participant(room_index, target_id) else {
            self.send_error(index, "Target client not found in room");
            return;
        };

        let sender_id = match self.clients.get(index) {
            Some(client) => client.id.clone(),
            None => return,
        };

        let mut body = Map::new();
        body.insert("fromClientId".to_owned(), Value::String(sender_id));
        body.insert(
            payload_key.to_owned(),
            data.get(payload_key).cloned().unwrap_or(Value::Null),
        );
        self.send_to(target_index, event, Value::Object(body));
    }

    /// O(6) scan of a room for the participant with this client id
    fn find_participant(&self, room_index: usize, client_id: &str) -> Option<usize> {
        let room = self.rooms.get(room_index)?;
        room.member_slots()
            .find(|&slot| self.clients.get(slot).is_some_and(|c| c.id == client_id))
    }

    /// Send the slot-ordered participant list to every member of the room
    fn broadcast_participants(&mut self, room_index: usize) {
        let Some(room) = self.rooms.get(room_index) else {
            return;
        };
        let participants: Vec<String> = room
            .member_slots()
            .filter_map(|slot| self.clients.get(slot).map(|c| c.id.clone()))
            .collect();
        let payload = json!({ "roomId": room.id, "participants": participants });
        self.broadcast_room(room_index, None, EVENT_PARTICIPANTS, payload);
    }

    /// Send one event to every live member except `exclude`. Returns the
    /// number of successful sends.
    fn broadcast_room(
        &mut self,
        room_index: usize,
        exclude: Option<usize>,
        event: &str,
        data: Value,
    ) -> usize {
        let frame = match Envelope::new(event, data).to_text() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode '{}' broadcast: {}", event, e);
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
        };

        let members: Vec<usize> = match self.rooms.get(room_index) {
            Some(room) => room.member_slots().collect(),
            None => return 0,
        };

        let mut sent = 0;
        for slot in members {
            if exclude == Some(slot) {
                continue;
            }
            if let Some(client) = self.clients.get_mut(slot) {
                if client.send(frame.clone()) {
                    sent += 1;
                } else {
                    warn!("Failed to queue '{}' for client {}", event, client.id);
                }
            }
        }
        if let Some(room) = self.rooms.get_mut(room_index) {
            room.last_activity = now_secs();
        }
        sent
    }

    fn send_to(&mut self, index: usize, event: &str, data: Value) -> bool {
        let frame = match Envelope::new(event, data).to_text() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode '{}': {}", event, e);
                self.stats.total_errors.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        match self.clients.get_mut(index) {
            Some(client) => {
                let queued = client.send(frame);
                if !queued {
                    warn!("Failed to queue '{}' for client {}", event, client.id);
                }
                queued
            }
            None => false,
        }
    }

    fn send_error(&mut self, index: usize, reason: &str) {
        self.send_to(index, EVENT_ERROR, Value::String(reason.to_owned()));
    }

    /// Evict clients idle past the timeout — exactly as if their socket had
    /// closed — then free drained rooms.
    pub fn reap(&mut self) {
        let now = now_secs();
        let expired: Vec<usize> = self
            .clients
            .live_indices()
            .into_iter()
            .filter(|&index| {
                self.clients
                    .get(index)
                    .is_some_and(|c| c.is_timed_out(self.client_timeout_secs, now))
            })
            .collect();
        for index in expired {
            self.remove_client(index, "timed out");
        }

        let reaped = self.rooms.reap_empty();
        if reaped > 0 {
            info!(
                "Reaped {} empty room(s) ({} active)",
                reaped,
                self.rooms.active_count()
            );
        }
        self.publish_gauges();
    }

    fn publish_gauges(&self) {
        self.stats
            .active_clients
            .store(self.clients.active_count() as u64, Ordering::Relaxed);
        self.stats
            .active_rooms
            .store(self.rooms.active_count() as u64, Ordering::Relaxed);
    }
}
