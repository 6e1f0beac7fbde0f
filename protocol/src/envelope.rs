//! The `{event, data}` JSON envelope wrapping every frame

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// A single signaling frame in either direction.
///
/// `data` is `Value::Null` when a frame carries no payload. It is always
/// written on the wire, so every serialized frame has exactly two top-level
/// keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name, one of the constants in [`crate::events`]
    pub event: String,
    /// Opaque JSON payload
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope from an event name and a payload value
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode a text frame.
    ///
    /// Rejects frames that are not JSON objects, frames without a string
    /// `event`, and frames whose event name is empty.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.event.is_empty() {
            return Err(ProtocolError::EmptyEvent);
        }
        Ok(envelope)
    }

    /// Encode to a compact text frame
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
