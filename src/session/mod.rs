//! Per-connection session state
//!
//! A session is one admitted WebSocket connection: its immutable context and
//! the lifecycle shared by its inbound and outbound pumps.

pub mod context;
pub mod state;

pub use context::ConnectionContext;
pub use state::{ConnectionPhase, ConnectionState};
