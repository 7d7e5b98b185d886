//! Statistics and metrics for the sync hub

use std::sync::atomic::{AtomicU64, Ordering};

/// Hub-wide counters
///
/// Updated lock-free from the registry and from every pump task.
#[derive(Debug, Default)]
pub struct HubStats {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    frames_received: AtomicU64,
    frames_ignored: AtomicU64,
    persist_failures: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Connections ever registered
    pub connections_total: u64,
    /// Connections currently registered
    pub connections_active: u64,
    /// Data frames read from clients
    pub frames_received: u64,
    /// Frames dropped as malformed or empty
    pub frames_ignored: u64,
    /// Frames whose persistence failed
    pub persist_failures: u64,
    /// Frames queued onto mailboxes
    pub deliveries: u64,
    /// Connections evicted for a full or closed mailbox
    pub evictions: u64,
    /// Transport writes that failed
    pub write_failures: u64,
}

impl HubStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        // Saturating: a stray double decrement must not wrap
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_ignored(&self) {
        self.frames_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn persist_failed(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self, count: u64) {
        self.deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn write_failed(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
