//! Rooms and the slotted room registry.
//!
//! A room is a fixed array of six participant slots plus an owner. Members
//! are recorded by their client-registry slot index; the dispatcher resolves
//! those indices when it needs the actual session. Rooms that drain to zero
//! participants stay allocated (and joinable by id) until the reaper frees
//! them.

use tracing::debug;
use uuid::Uuid;

use crate::clients::{Client, ClientState};
use crate::time::now_secs;

/// Hard cap on participants per room; not configurable
pub const MAX_PARTICIPANTS: usize = 6;

/// Longest room name kept, in bytes
pub const MAX_ROOM_NAME_BYTES: usize = 63;

/// Lifecycle state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Allocated with at least one participant
    Active,
    /// Allocated but drained; joinable until the reaper frees it
    Empty,
    /// Being freed
    Closing,
}

/// One occupied participant slot
#[derive(Debug, Clone, Copy)]
pub struct Participant {
    /// Client registry slot of the member
    pub client: usize,
    pub joined_at: u64,
    pub is_owner: bool,
}

/// Why a join was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// All participant slots are taken
    RoomFull,
    /// The client already occupies a slot in this room
    AlreadyInRoom,
    /// The client's back-reference points at a different room
    InOtherRoom,
}

/// A bounded set of clients exchanging signaling payloads
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub participants: [Option<Participant>; MAX_PARTICIPANTS],
    pub participant_count: usize,
    pub state: RoomState,
    pub created_at: u64,
    pub last_activity: u64,
    /// Client registry slot of the owner, if any
    pub owner: Option<usize>,
}

impl Room {
    fn new(name: &str, owner: usize) -> Self {
        let now = now_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            name: truncate_name(name),
            participants: [None; MAX_PARTICIPANTS],
            participant_count: 0,
            state: RoomState::Empty,
            created_at: now,
            last_activity: now,
            owner: Some(owner),
        }
    }

    pub fn is_full(&self) -> bool {
        self.participant_count >= MAX_PARTICIPANTS
    }

    pub fn is_empty(&self) -> bool {
        self.participant_count == 0
    }

    /// Whether `client_slot` occupies one of this room's slots
    pub fn contains(&self, client_slot: usize) -> bool {
        self.participants
            .iter()
            .flatten()
            .any(|p| p.client == client_slot)
    }

    /// Seat `client` in the lowest-index empty slot and point its
    /// back-reference at this room. `room_slot` is this room's own registry
    /// slot.
    pub fn add_participant(
        &mut self,
        client: &mut Client,
        client_slot: usize,
        room_slot: usize,
    ) -> Result<(), JoinError> {
        if self.is_full() {
            return Err(JoinError::RoomFull);
        }
        if self.contains(client_slot) {
            return Err(JoinError::AlreadyInRoom);
        }
        if client.current_room.is_some_and(|room| room != room_slot) {
            return Err(JoinError::InOtherRoom);
        }

        let now = now_secs();
        for slot in self.participants.iter_mut() {
            if slot.is_none() {
                *slot = Some(Participant {
                    client: client_slot,
                    joined_at: now,
                    is_owner: self.owner == Some(client_slot),
                });
                self.participant_count += 1;
                self.state = RoomState::Active;
                self.last_activity = now;
                client.current_room = Some(room_slot);
                client.state = ClientState::InRoom;
                return Ok(());
            }
        }
        // The count said there was space; treat a missing slot as full anyway
        Err(JoinError::RoomFull)
    }

    /// Clear the matching slot and reset the client's back-reference.
    /// Promotes the lowest-index survivor when the owner departs. Returns
    /// false when the client held no slot here.
    pub fn remove_participant(&mut self, client: &mut Client, client_slot: usize) -> bool {
        let Some(position) = self
            .participants
            .iter()
            .position(|slot| slot.map(|p| p.client) == Some(client_slot))
        else {
            return false;
        };

        self.participants[position] = None;
        self.participant_count -= 1;
        self.last_activity = now_secs();
        client.current_room = None;
        client.state = ClientState::Connected;

        if self.owner == Some(client_slot) {
            self.owner = None;
            if let Some(next) = self.participants.iter_mut().flatten().next() {
                next.is_owner = true;
                self.owner = Some(next.client);
            }
        }
        if self.is_empty() {
            self.state = RoomState::Empty;
        }
        true
    }

    /// Client slots in participant-array order
    pub fn member_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.participants.iter().flatten().map(|p| p.client)
    }
}

/// Truncate to `MAX_ROOM_NAME_BYTES` without splitting a UTF-8 sequence
fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_ROOM_NAME_BYTES {
        return name.to_string();
    }
    let mut end = MAX_ROOM_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Fixed-capacity slotted table of rooms
#[derive(Debug)]
pub struct RoomRegistry {
    slots: Vec<Option<Room>>,
    active: usize,
}

impl RoomRegistry {
    /// Pre-allocate `max_rooms` slots
    pub fn new(max_rooms: usize) -> Self {
        let mut slots = Vec::with_capacity(max_rooms);
        slots.resize_with(max_rooms, || None);
        Self { slots, active: 0 }
    }

    /// Allocate a room in the first free slot. The owner is recorded but not
    /// seated; the caller follows up with `add_participant`. Returns the
    /// room's slot index, or None at capacity.
    pub fn create(&mut self, name: &str, owner: usize) -> Option<usize> {
        let free = self.slots.iter().position(|slot| slot.is_none())?;
        self.slots[free] = Some(Room::new(name, owner));
        self.active += 1;
        Some(free)
    }

    pub fn get(&self, index: usize) -> Option<&Room> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Room> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// O(N) scan for an allocated room by its 36-character id
    pub fn find_by_id(&self, room_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(r) if r.state != RoomState::Closing && r.id == room_id))
    }

    /// O(N·6) reverse lookup; the client back-reference is the fast path
    pub fn find_by_client(&self, client_slot: usize) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(r) if r.contains(client_slot)))
    }

    /// Free every allocated room with no participants. Returns the number
    /// reaped.
    pub fn reap_empty(&mut self) -> usize {
        let mut reaped = 0;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(room) if room.is_empty()) {
                if let Some(room) = slot.as_mut() {
                    room.state = RoomState::Closing;
                    debug!("Reaping empty room {} ({})", room.id, room.name);
                }
                *slot = None;
                self.active -= 1;
                reaped += 1;
            }
        }
        reaped
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot indices of every allocated room
    pub fn live_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
            .collect()
    }
}
