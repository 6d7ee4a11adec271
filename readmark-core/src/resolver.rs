//! Marker resolution.
//!
//! Turns a [`MarkerRequest`] into a [`MarkerPlan`]: which pointers to write
//! locally, whether to reset the room summary, and what to tell the server.
//!
//! Resolution is split in two so the I/O layer can fetch exactly what it
//! needs from one snapshot:
//!
//! ```text
//! request ──effective_targets(latest)──► MarkerTargets
//!                                             │ (store snapshot of positions)
//!                                             ▼
//!                              plan(targets, snapshot) ──► MarkerPlan
//! ```
//!
//! Both steps are pure.

use readmark_types::{
    EventId, MarkerTargets, RoomId, StreamOrdering, FULLY_READ_KEY, READ_RECEIPT_KEY,
};

use crate::echo::reject_local_echo;
use crate::guard::{is_already_read, is_more_recent_than_stored, StoredPointer};

/// A request to move the read pointers of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRequest {
    /// Room whose pointers move.
    pub room_id: RoomId,
    /// Explicit fully-read target.
    pub fully_read_event_id: Option<EventId>,
    /// Explicit read-receipt target.
    pub read_receipt_event_id: Option<EventId>,
    /// Point the read receipt at the latest synced event instead.
    pub force_read_receipt: bool,
    /// Point the fully-read marker at the latest synced event instead.
    pub force_read_marker: bool,
}

impl MarkerRequest {
    /// A request that moves nothing until targets are added.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            fully_read_event_id: None,
            read_receipt_event_id: None,
            force_read_receipt: false,
            force_read_marker: false,
        }
    }

    /// Set the explicit fully-read target.
    pub fn fully_read(mut self, event_id: EventId) -> Self {
        self.fully_read_event_id = Some(event_id);
        self
    }

    /// Set the explicit read-receipt target.
    pub fn read_receipt(mut self, event_id: EventId) -> Self {
        self.read_receipt_event_id = Some(event_id);
        self
    }

    /// Move the fully-read marker to the latest synced event.
    pub fn force_read_marker(mut self) -> Self {
        self.force_read_marker = true;
        self
    }

    /// Move the read receipt to the latest synced event.
    pub fn force_read_receipt(mut self) -> Self {
        self.force_read_receipt = true;
        self
    }

    /// Mark the whole room as read: both pointers to the latest event.
    pub fn mark_all_read(room_id: RoomId) -> Self {
        Self::new(room_id).force_read_marker().force_read_receipt()
    }
}

/// Apply the force flags: forced pointers target `latest`, the others keep
/// their explicit target.
pub fn effective_targets(request: &MarkerRequest, latest: Option<&EventId>) -> MarkerTargets {
    let pick = |force: bool, explicit: &Option<EventId>| {
        if force {
            latest.cloned()
        } else {
            explicit.clone()
        }
    };

    MarkerTargets {
        fully_read: pick(request.force_read_marker, &request.fully_read_event_id),
        read_receipt: pick(request.force_read_receipt, &request.read_receipt_event_id),
    }
}

/// Positions read from one point-in-time view of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStateSnapshot {
    /// Latest event not pending send.
    pub latest: Option<EventId>,
    /// Stored fully-read marker.
    pub stored_marker: StoredPointer,
    /// Stored read receipt of the acting user.
    pub stored_receipt: StoredPointer,
    /// Position of the effective fully-read target, if known and synced.
    pub fully_read_position: Option<StreamOrdering>,
    /// Position of the effective read-receipt target, if known and synced.
    pub read_receipt_position: Option<StreamOrdering>,
}

/// The outcome of resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerPlan {
    /// Pointers that advance.
    pub staged: MarkerTargets,
    /// Whether the room summary's unread counters are reset.
    pub reset_summary: bool,
}

impl MarkerPlan {
    /// Whether the local store must be touched at all.
    pub fn writes_locally(&self) -> bool {
        !self.staged.is_empty() || self.reset_summary
    }

    /// Whether there is anything to tell the server.
    pub fn notifies_remote(&self) -> bool {
        !self.staged.is_empty()
    }
}

/// Decide which of the effective targets are actually written.
///
/// A target is staged only if it is not a local echo and moves its pointer
/// forward. The summary resets when the receipt target is the latest synced
/// event, whether or not the receipt itself moves.
pub fn plan(room_id: &RoomId, effective: MarkerTargets, snapshot: &ReadStateSnapshot) -> MarkerPlan {
    let reset_summary = match (&effective.read_receipt, &snapshot.latest) {
        (Some(target), Some(latest)) => target == latest,
        _ => false,
    };

    let fully_read = reject_local_echo(room_id, FULLY_READ_KEY, effective.fully_read).filter(|_| {
        is_more_recent_than_stored(snapshot.fully_read_position, snapshot.stored_marker)
    });

    let read_receipt = reject_local_echo(room_id, READ_RECEIPT_KEY, effective.read_receipt)
        .filter(|_| !is_already_read(snapshot.read_receipt_position, snapshot.stored_receipt));

    MarkerPlan {
        staged: MarkerTargets {
            fully_read,
            read_receipt,
        },
        reset_summary,
    }
}
