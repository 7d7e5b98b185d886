//! Inbound clipboard payloads
//!
//! Clients send JSON objects of the form
//!
//! ```json
//! {"content_type": "text", "content": "hello", "source_device": "laptop"}
//! ```
//!
//! Unknown fields are ignored. Missing fields decode as empty and are then
//! rejected by validation, so the frame is dropped rather than the connection.

use serde::Deserialize;

use crate::error::FrameError;

/// A decoded and validated inbound frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundPayload {
    /// MIME-like kind of the content, e.g. "text" or "image"
    #[serde(default)]
    pub content_type: String,

    /// Clipboard content (opaque; may already be encrypted by the client)
    #[serde(default)]
    pub content: String,

    /// Human-readable name of the sending device
    #[serde(default)]
    pub source_device: Option<String>,
}

impl InboundPayload {
    /// Decode a frame body and check required fields
    pub fn decode(body: &[u8]) -> Result<Self, FrameError> {
        let payload: InboundPayload = serde_json::from_slice(body).map_err(FrameError::Decode)?;
        payload.validate()
    }

    /// Source device, or an empty string when the client did not send one
    pub fn source_device(&self) -> &str {
        self.source_device.as_deref().unwrap_or("")
    }

    fn validate(self) -> Result<Self, FrameError> {
        if self.content_type.is_empty() {
            return Err(FrameError::EmptyField("content_type"));
        }
        if self.content.is_empty() {
            return Err(FrameError::EmptyField("content"));
        }
        Ok(self)
    }
}
