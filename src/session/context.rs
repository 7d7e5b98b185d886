//! Connection context
//!
//! Immutable facts about one admitted connection, shared by its pumps and
//! used as the registry handle for that connection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::{ConnectionId, OwnerId};

/// Identity and origin of a live connection
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Unique connection ID
    pub id: ConnectionId,

    /// Owner the connection was authenticated as
    pub owner: OwnerId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the upgrade completed
    pub connected_at: Instant,
}

impl ConnectionContext {
    /// Create a new context
    pub fn new(id: ConnectionId, owner: OwnerId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            owner,
            peer_addr,
            connected_at: Instant::now(),
        }
    }

    /// Time since the upgrade completed
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
