//! Parley Wire Protocol
//!
//! The envelope format and event vocabulary shared by the signaling server
//! and its clients. Every WebSocket text frame in either direction carries
//! one compact JSON object:
//!
//! ```json
//! { "event": "<event-name>", "data": <object|string|null> }
//! ```
//!
//! Payloads are opaque to the server — SDP bodies and ICE candidates are
//! forwarded verbatim.

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod events;

pub use envelope::Envelope;
pub use error::ProtocolError;

/// Version of the signaling protocol
pub const PROTOCOL_VERSION: u8 = 1;
