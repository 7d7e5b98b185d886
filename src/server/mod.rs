//! WebSocket server
//!
//! Accepts TCP connections, admits them as authenticated WebSocket
//! connections and runs one inbound and one outbound pump per connection.

pub mod admission;
pub mod config;
pub mod listener;
pub mod pump;

pub use admission::{Admission, AdmittedConnection};
pub use config::ServerConfig;
pub use listener::SyncServer;
