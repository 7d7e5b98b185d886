//! Identity and payload types for fan-out routing
//!
//! This module defines the keys that identify owners and connections, and the
//! frames that are queued onto connection mailboxes.

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::error::FrameError;

/// Authenticated principal a connection belongs to
///
/// Opaque to the hub; several connections (devices) may share one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Create an owner identity from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-unique identity of one live connection
///
/// Registry membership is keyed by this id, never by connection contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a connection id from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payload queued for delivery to one or more connections
///
/// Cheap to clone: the text is reference-counted, so fan-out to many
/// mailboxes shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    text: Utf8Bytes,
}

impl OutboundFrame {
    /// Create a frame from already-encoded text
    pub fn text(text: impl Into<Utf8Bytes>) -> Self {
        Self { text: text.into() }
    }

    /// Encode a record as a JSON frame
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, FrameError> {
        let json = serde_json::to_string(record).map_err(FrameError::Encode)?;
        Ok(Self::text(json))
    }

    /// Frame contents
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Length in bytes
    pub(crate) fn len(&self) -> usize {
        self.text.len()
    }

    /// Convert into a WebSocket text message
    pub fn into_message(self) -> Message {
        Message::Text(self.text)
    }
}
