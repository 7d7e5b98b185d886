//! Connection registry for per-owner fan-out
//!
//! The registry maps each owner to that owner's live connections and routes
//! outbound frames to their mailboxes.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<Registry>
//!               ┌──────────────────────────────┐
//!               │ owners: HashMap<OwnerId,     │
//!               │   HashMap<ConnectionId,      │
//!               │     Mailbox (mpsc::Sender)>  │
//!               │ >                            │
//!               └──────────────┬───────────────┘
//!                              │ try_send
//!         ┌────────────────────┼────────────────────┐
//!         ▼                    ▼                    ▼
//!   [outbound pump]      [outbound pump]      [outbound pump]
//!   mailbox.recv()       mailbox.recv()       mailbox.recv()
//!         │                    │                    │
//!         └──► WebSocket ◄─────┴──── WebSocket ◄────┘
//! ```
//!
//! # Backpressure
//!
//! Enqueueing never waits. A connection whose mailbox is full is evicted:
//! removed from the map, which drops the only sender and closes the mailbox,
//! and its lifecycle moves to `Unregistering` so both pumps stop.

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{mailbox, Mailbox, MailboxReceiver, Offer};
pub use frame::{ConnectionId, OutboundFrame, OwnerId};
pub use store::{DeliveryReport, Registry};
