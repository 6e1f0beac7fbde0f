//! Parley — an in-memory WebRTC signaling server.
//!
//! The core is four pieces: a slotted client registry, a slotted room
//! registry with a hard six-participant cap, a bounded ingress queue fed by
//! the WebSocket gateway, and a single dispatcher task that owns all mutable
//! state and relays offer/answer/ICE traffic between room members.

pub mod clients;
pub mod config;
pub mod dispatcher;
pub mod ingress;
pub mod rooms;
pub mod routing;
pub mod stats;
pub mod time;
pub mod websocket;
