//! Stored clipboard records and history queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::OwnerId;

/// Default page size for history queries
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Largest page size a history query may ask for
pub const MAX_HISTORY_LIMIT: usize = 100;

/// A persisted clipboard entry
///
/// This is the canonical record fanned out to every device of the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    /// Store-assigned identity
    pub id: u64,
    /// Owner the entry belongs to
    pub user_id: OwnerId,
    /// Kind of content, e.g. "text"
    pub content_type: String,
    /// Content as sent by the client
    pub content: String,
    /// Device that produced the entry (may be empty)
    pub source_device: String,
    /// Whether the entry is shared with a team
    pub is_shared: bool,
    /// Team the entry is shared with, for shared entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u64>,
    /// When the entry was stored
    pub created_at: DateTime<Utc>,
}

/// Page of a user's history
///
/// Out-of-range input is clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum entries to return
    pub limit: usize,
    /// Entries to skip, newest first
    pub offset: usize,
}

impl HistoryQuery {
    /// Build a query from raw client input
    ///
    /// A limit outside `1..=100` becomes 20; a negative offset becomes 0.
    pub fn new(limit: i64, offset: i64) -> Self {
        let limit = if limit <= 0 || limit > MAX_HISTORY_LIMIT as i64 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit as usize
        };
        let offset = offset.max(0) as usize;

        Self { limit, offset }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
        }
    }
}
