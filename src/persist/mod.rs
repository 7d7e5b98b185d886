//! Persistence collaborator
//!
//! The hub does not own storage. It hands every valid inbound payload to an
//! [`EntryStore`] and fans out whatever record the store returns, so every
//! device sees the confirmed, persisted version.

use std::future::Future;

pub mod entry;
pub mod memory;

pub use entry::{ClipboardEntry, HistoryQuery, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use memory::MemoryStore;

use crate::error::PersistError;
use crate::registry::OwnerId;

/// Storage for clipboard entries
///
/// Implementations may be written with `async fn`.
pub trait EntryStore: Send + Sync + 'static {
    /// Persist one entry and return the canonical stored record
    fn store(
        &self,
        owner: OwnerId,
        content_type: &str,
        content: &str,
        source_device: &str,
    ) -> impl Future<Output = Result<ClipboardEntry, PersistError>> + Send;

    /// A page of the owner's entries, newest first
    fn history(
        &self,
        owner: OwnerId,
        query: HistoryQuery,
    ) -> impl Future<Output = Result<Vec<ClipboardEntry>, PersistError>> + Send;
}
