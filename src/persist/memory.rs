//! In-memory entry store
//!
//! Keeps every entry in process memory. Useful for demos, tests and single
//! node deployments that do not need history to survive a restart.

use chrono::Utc;
use tokio::sync::RwLock;

use super::entry::{ClipboardEntry, HistoryQuery};
use super::EntryStore;
use crate::error::PersistError;
use crate::registry::OwnerId;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    entries: Vec<ClipboardEntry>,
}

/// Entry store backed by a vector
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored across all owners
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl EntryStore for MemoryStore {
    async fn store(
        &self,
        owner: OwnerId,
        content_type: &str,
        content: &str,
        source_device: &str,
    ) -> Result<ClipboardEntry, PersistError> {
        if content_type.is_empty() {
            return Err(PersistError::InvalidEntry("content_type"));
        }
        if content.is_empty() {
            return Err(PersistError::InvalidEntry("content"));
        }

        let mut inner = self.inner.write().await;
        inner.next_id += 1;

        let entry = ClipboardEntry {
            id: inner.next_id,
            user_id: owner,
            content_type: content_type.to_string(),
            content: content.to_string(),
            source_device: source_device.to_string(),
            is_shared: false,
            team_id: None,
            created_at: Utc::now(),
        };
        inner.entries.push(entry.clone());

        tracing::debug!(
            owner = %owner,
            entry_id = entry.id,
            content_type = %content_type,
            "Clipboard entry stored"
        );

        Ok(entry)
    }

    async fn history(
        &self,
        owner: OwnerId,
        query: HistoryQuery,
    ) -> Result<Vec<ClipboardEntry>, PersistError> {
        let inner = self.inner.read().await;

        Ok(inner
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == owner)
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
