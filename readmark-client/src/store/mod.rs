//! Local store for read state.
//!
//! Holds the room timeline's ordering data, the fully-read markers, the
//! per-user read receipts and the room summaries. All marker writes go
//! through [`SqliteStore::apply_atomically`].

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use async_trait::async_trait;
use readmark_core::ReadStateSnapshot;
use readmark_types::{FullyReadContent, MarkerTargets, ReadReceiptContent, RoomId};
use sqlx::SqliteConnection;
use std::sync::Arc;

/// Aggregated unread counters of a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomSummary {
    /// Number of unread events that triggered a notification.
    pub unread_notification_count: u32,
    /// Number of unread events that highlighted the user.
    pub unread_highlight_count: u32,
    /// Whether there is anything unread at all.
    pub has_unread_messages: bool,
}

impl RoomSummary {
    /// Whether all counters are in their read state.
    pub fn is_read(&self) -> bool {
        self.unread_notification_count == 0
            && self.unread_highlight_count == 0
            && !self.has_unread_messages
    }
}

/// What a resolution read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomReadState {
    /// Targets after applying the request's force flags.
    pub effective: MarkerTargets,
    /// Positions needed to plan the write.
    pub snapshot: ReadStateSnapshot,
}

/// What a committed write changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Pointers actually moved.
    pub written: MarkerTargets,
    /// Whether a summary row was reset.
    pub summary_reset: bool,
}

/// Folds applied marker content into the rest of the sync model.
///
/// Invoked on the write transaction's connection, so anything a handler
/// writes commits or rolls back together with the marker itself. Returning
/// an error aborts the whole write.
#[async_trait]
pub trait ContentHandler<C: Send + Sync>: Send + Sync {
    /// Handle content that was just written for `room_id`.
    async fn handle(
        &self,
        conn: &mut SqliteConnection,
        room_id: &RoomId,
        content: &C,
    ) -> Result<(), StoreError>;
}

/// Handler that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl<C: Send + Sync> ContentHandler<C> for NoopHandler {
    async fn handle(
        &self,
        _conn: &mut SqliteConnection,
        _room_id: &RoomId,
        _content: &C,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The marker-applied and receipt-applied handlers.
#[derive(Clone)]
pub struct Handlers {
    /// Called after the fully-read marker moves.
    pub fully_read: Arc<dyn ContentHandler<FullyReadContent>>,
    /// Called after the read receipt moves.
    pub read_receipt: Arc<dyn ContentHandler<ReadReceiptContent>>,
}

impl Handlers {
    /// Bundle two handlers.
    pub fn new(
        fully_read: Arc<dyn ContentHandler<FullyReadContent>>,
        read_receipt: Arc<dyn ContentHandler<ReadReceiptContent>>,
    ) -> Self {
        Self {
            fully_read,
            read_receipt,
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new(Arc::new(NoopHandler), Arc::new(NoopHandler))
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}
