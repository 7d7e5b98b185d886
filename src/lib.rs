//! Real-time fan-out hub for clipboard synchronisation
//!
//! Every authenticated WebSocket connection belongs to an owner identity. A
//! user may have many devices connected at once; whenever one of them sends a
//! clipboard entry, the entry is persisted and the stored record is fanned out
//! to every connection of the same owner, originator included.
//!
//! # Architecture
//!
//! ```text
//!   TcpListener ──► admission ──► Registry::register
//!                       │
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!      inbound_pump           outbound_pump
//!   read ─► decode ─► store    mailbox.recv ─► write
//!            │                     ▲
//!            └─► Registry::deliver_to_owner (try_send, evict if full)
//! ```
//!
//! Slow consumers never block producers: a full mailbox evicts its connection.

pub mod auth;
pub mod error;
pub mod persist;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use auth::{Authenticator, JwtAuthenticator, StaticTokenAuthenticator, UpgradeRequest};
pub use error::{Error, Result};
pub use persist::{ClipboardEntry, EntryStore, HistoryQuery, MemoryStore};
pub use registry::{ConnectionId, OutboundFrame, OwnerId, Registry, RegistryConfig};
pub use server::{ServerConfig, SyncServer};
pub use stats::{HubStats, HubStatsSnapshot};
