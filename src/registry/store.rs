//! Connection registry implementation
//!
//! The single source of truth for who is connected and who should receive a
//! message. Every membership mutation goes through this type.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{mailbox, Mailbox, MailboxReceiver, Offer};
use super::frame::{ConnectionId, OutboundFrame, OwnerId};
use crate::session::{ConnectionContext, ConnectionState};
use crate::stats::HubStats;

/// Outcome of a fan-out, for logging and tests only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Mailboxes the frame was queued on
    pub delivered: usize,
    /// Connections evicted because their mailbox was full or closed
    pub evicted: usize,
}

type OwnerSet = HashMap<ConnectionId, Mailbox>;

/// Registry of live connections, grouped by owner
///
/// Thread-safe via `RwLock`. Fan-out takes the read lock and only enqueues
/// with `try_send`, so no lock is ever held across a blocking send. Evictions
/// found during fan-out are applied afterwards under the write lock.
pub struct Registry {
    /// Owner -> that owner's connections
    owners: RwLock<HashMap<OwnerId, OwnerSet>>,

    /// Configuration
    config: RegistryConfig,

    /// Shared counters
    stats: Arc<HubStats>,
}

impl Registry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_stats(config, Arc::new(HubStats::new()))
    }

    /// Create a new registry reporting into existing counters
    pub fn with_stats(config: RegistryConfig, stats: Arc<HubStats>) -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
            config,
            stats,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the shared counters
    pub fn stats(&self) -> &Arc<HubStats> {
        &self.stats
    }

    /// Build a mailbox pair sized by this registry's configuration
    pub fn open_mailbox(&self, state: &Arc<ConnectionState>) -> (Mailbox, MailboxReceiver) {
        mailbox(self.config.mailbox_capacity, Arc::clone(state))
    }

    /// Add a connection to its owner's set, creating the set if absent
    pub async fn register(&self, conn: &ConnectionContext, mailbox: Mailbox) {
        let mut owners = self.owners.write().await;
        let set = owners.entry(conn.owner).or_default();
        set.insert(conn.id, mailbox);
        let owner_connections = set.len();
        drop(owners);

        self.stats.connection_opened();

        tracing::info!(
            owner = %conn.owner,
            conn_id = conn.id.get(),
            peer = %conn.peer_addr,
            owner_connections = owner_connections,
            "Connection registered"
        );
    }

    /// Remove a connection and close its mailbox
    ///
    /// A no-op if the connection is already gone, so either pump (or an
    /// eviction) may trigger it. Drops the owner entry once its set is empty.
    /// Returns whether this call removed the connection.
    pub async fn unregister(&self, conn: &ConnectionContext) -> bool {
        let mut owners = self.owners.write().await;
        let Some((removed, remaining)) = remove_entry(&mut owners, conn.owner, conn.id) else {
            return false;
        };
        drop(owners);

        // Dropping the only sender closes the mailbox
        drop(removed);
        self.stats.connection_closed();

        tracing::info!(
            owner = %conn.owner,
            conn_id = conn.id.get(),
            peer = %conn.peer_addr,
            owner_connections = remaining,
            duration_ms = conn.duration().as_millis() as u64,
            "Connection unregistered"
        );

        true
    }

    /// Queue a frame for every connection of `owner`
    ///
    /// Never blocks and never fails. A connection whose mailbox is full (or
    /// whose pump is gone) is evicted instead of holding up the others.
    pub async fn deliver_to_owner(&self, owner: OwnerId, frame: OutboundFrame) -> DeliveryReport {
        let (delivered, failed) = {
            let owners = self.owners.read().await;
            match owners.get(&owner) {
                Some(set) => offer_all(set, &frame),
                None => (0, Vec::new()),
            }
        };

        let evicted = if failed.is_empty() {
            0
        } else {
            self.evict(failed.into_iter().map(|(id, offer)| (owner, id, offer)))
                .await
        };

        self.stats.delivered(delivered as u64);

        tracing::trace!(
            owner = %owner,
            delivered = delivered,
            evicted = evicted,
            bytes = frame.len(),
            "Delivered to owner"
        );

        DeliveryReport { delivered, evicted }
    }

    /// Queue a frame for every registered connection regardless of owner
    ///
    /// Operator-level announcements only; same evict-on-full policy.
    pub async fn broadcast_all(&self, frame: OutboundFrame) -> DeliveryReport {
        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let owners = self.owners.read().await;
            for (owner, set) in owners.iter() {
                let (ok, bad) = offer_all(set, &frame);
                delivered += ok;
                failed.extend(bad.into_iter().map(|(id, offer)| (*owner, id, offer)));
            }
        }

        let evicted = if failed.is_empty() {
            0
        } else {
            self.evict(failed.into_iter()).await
        };

        self.stats.delivered(delivered as u64);

        tracing::debug!(
            delivered = delivered,
            evicted = evicted,
            "Broadcast to all connections"
        );

        DeliveryReport { delivered, evicted }
    }

    /// Total registered connections
    pub async fn connection_count(&self) -> usize {
        self.owners.read().await.values().map(HashMap::len).sum()
    }

    /// Owners with at least one registered connection
    pub async fn owner_count(&self) -> usize {
        self.owners.read().await.len()
    }

    /// Registered connections for one owner
    pub async fn owner_connection_count(&self, owner: OwnerId) -> usize {
        self.owners
            .read()
            .await
            .get(&owner)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Whether a specific connection is registered
    pub async fn is_registered(&self, owner: OwnerId, conn_id: ConnectionId) -> bool {
        self.owners
            .read()
            .await
            .get(&owner)
            .is_some_and(|set| set.contains_key(&conn_id))
    }

    /// Remove connections that failed an enqueue, closing their mailboxes
    async fn evict(
        &self,
        failed: impl Iterator<Item = (OwnerId, ConnectionId, Offer)>,
    ) -> usize {
        let mut owners = self.owners.write().await;
        let mut evicted = Vec::new();

        for (owner, conn_id, offer) in failed {
            // Another task may have unregistered it since the read phase
            if let Some((mailbox, remaining)) = remove_entry(&mut owners, owner, conn_id) {
                evicted.push((owner, conn_id, offer, remaining, mailbox));
            }
        }
        drop(owners);

        let count = evicted.len();
        for (owner, conn_id, offer, remaining, mailbox) in evicted {
            // Wakes both pumps even if the writer is blocked on the socket
            mailbox.evict();
            self.stats.connection_closed();

            let reason = match offer {
                Offer::Full => "mailbox full",
                _ => "mailbox closed",
            };
            tracing::warn!(
                owner = %owner,
                conn_id = conn_id.get(),
                owner_connections = remaining,
                reason = reason,
                "Connection evicted"
            );
        }

        self.stats.evicted(count as u64);
        count
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Offer a frame to every mailbox in a set
///
/// Returns the number queued and the connections that refused it.
fn offer_all(set: &OwnerSet, frame: &OutboundFrame) -> (usize, Vec<(ConnectionId, Offer)>) {
    let mut delivered = 0;
    let mut failed = Vec::new();

    for (conn_id, mailbox) in set {
        match mailbox.offer(frame.clone()) {
            Offer::Queued => delivered += 1,
            offer => failed.push((*conn_id, offer)),
        }
    }

    (delivered, failed)
}

/// Remove one connection, dropping the owner entry if it becomes empty
///
/// Returns the removed mailbox and how many connections the owner has left.
fn remove_entry(
    owners: &mut HashMap<OwnerId, OwnerSet>,
    owner: OwnerId,
    conn_id: ConnectionId,
) -> Option<(Mailbox, usize)> {
    let set = owners.get_mut(&owner)?;
    let mailbox = set.remove(&conn_id)?;
    let remaining = set.len();
    if remaining == 0 {
        owners.remove(&owner);
    }
    Some((mailbox, remaining))
}
