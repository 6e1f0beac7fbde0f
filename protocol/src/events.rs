//! Event-name vocabulary.
//!
//! Client to server: `join-room`, `leave-room`, `offer`, `answer`,
//! `ice-candidate`. Server to client: `client-id`, `room-created`,
//! `participants`, `error`; relayed signals go back out under their own
//! names with a `fromClientId` stamped in.

/// Identity assignment, sent to a client right after accept
pub const EVENT_CLIENT_ID: &str = "client-id";

/// Join a room by id, or create one by name
pub const EVENT_JOIN_ROOM: &str = "join-room";

/// Leave the current room
pub const EVENT_LEAVE_ROOM: &str = "leave-room";

/// SDP offer, relayed to the targeted participant
pub const EVENT_OFFER: &str = "offer";

/// SDP answer, relayed to the targeted participant
pub const EVENT_ANSWER: &str = "answer";

/// ICE candidate, relayed to the targeted participant
pub const EVENT_ICE_CANDIDATE: &str = "ice-candidate";

/// Slot-ordered participant list, broadcast to a room's members
pub const EVENT_PARTICIPANTS: &str = "participants";

/// Confirmation sent to the creator of a new room only
pub const EVENT_ROOM_CREATED: &str = "room-created";

/// Error report; the payload is a human-readable string
pub const EVENT_ERROR: &str = "error";
