//! Client sessions and the slotted connection registry.
//!
//! The registry is a fixed-capacity table whose slots are reused after a
//! client departs. A client's slot index is stable for its whole lifetime,
//! which lets rooms refer to members by index; the dispatcher is the only
//! mutator, so those indices never dangle mid-operation.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::time::now_secs;

/// Opaque handle the gateway assigns to each WebSocket connection
pub type ConnId = u64;

/// Outbound frames buffered per client before sends start failing
pub const OUTBOUND_BUFFER: usize = 64;

/// Lifecycle state of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Connected and identified, not in any room
    Connected,
    /// A join is being processed
    Joining,
    /// Occupying a room slot
    InRoom,
    /// Being torn down; the slot is about to be released
    Disconnecting,
}

/// One live client session
#[derive(Debug)]
pub struct Client {
    /// Server-unique identity, assigned once at accept
    pub id: String,
    /// Connection handle owned by the gateway
    pub conn: ConnId,
    /// Outbound channel drained by the connection's forward task
    pub sender: mpsc::Sender<String>,
    pub state: ClientState,
    /// Room registry slot of the current room, if any
    pub current_room: Option<usize>,
    pub connected_at: u64,
    pub last_activity: u64,
    pub is_alive: bool,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl Client {
    fn new(conn: ConnId, sender: mpsc::Sender<String>) -> Self {
        let now = now_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            conn,
            sender,
            state: ClientState::Connected,
            current_room: None,
            connected_at: now,
            last_activity: now,
            is_alive: true,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Queue a frame on the outbound channel without blocking.
    ///
    /// Returns false — and leaves `messages_sent` untouched — when the
    /// client is gone or its buffer is full. There is no retry.
    pub fn send(&mut self, frame: String) -> bool {
        if !self.is_alive {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => {
                self.messages_sent += 1;
                true
            }
            Err(_) => false,
        }
    }

    /// Refresh the activity timestamp the reaper watches
    pub fn touch(&mut self) {
        self.last_activity = now_secs();
    }

    /// Whether this client has been quiet longer than `timeout_secs`
    pub fn is_timed_out(&self, timeout_secs: u64, now: u64) -> bool {
        now.saturating_sub(self.last_activity) > timeout_secs
    }
}

/// Fixed-capacity slotted table of client sessions
#[derive(Debug)]
pub struct ClientRegistry {
    slots: Vec<Option<Client>>,
    active: usize,
}

impl ClientRegistry {
    /// Pre-allocate `max_clients` slots
    pub fn new(max_clients: usize) -> Self {
        let mut slots = Vec::with_capacity(max_clients);
        slots.resize_with(max_clients, || None);
        Self { slots, active: 0 }
    }

    /// Claim the first free slot for a new connection and assign an
    /// identity. Returns the slot index, or None at capacity.
    pub fn add(&mut self, conn: ConnId, sender: mpsc::Sender<String>) -> Option<usize> {
        let free = self.slots.iter().position(|slot| slot.is_none())?;
        self.slots[free] = Some(Client::new(conn, sender));
        self.active += 1;
        Some(free)
    }

    pub fn get(&self, index: usize) -> Option<&Client> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Client> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// O(N) scan for the slot holding a connection handle
    pub fn index_of(&self, conn: ConnId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(c) if c.is_alive && c.conn == conn))
    }

    /// Release a slot. Dropping the returned record drops its outbound
    /// sender, which is what ultimately closes the client's socket.
    pub fn remove(&mut self, index: usize) -> Option<Client> {
        let mut client = self.slots.get_mut(index)?.take()?;
        client.is_alive = false;
        client.state = ClientState::Disconnecting;
        self.active -= 1;
        Some(client)
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot indices of every live client
    pub fn live_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
            .collect()
    }
}
