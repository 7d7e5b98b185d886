//! Wire protocol
//!
//! Inbound frames carry JSON clipboard payloads; outbound frames carry the
//! JSON-encoded stored record. This module also decides which transport
//! shutdowns are ordinary.

pub mod close;
pub mod payload;

pub use close::{classify_close, classify_error, normal_close, Disconnect};
pub use payload::InboundPayload;
