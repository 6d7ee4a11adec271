//! Monotonicity guard for read pointers.
//!
//! Both the fully-read marker and the read receipt only ever move forward in
//! stream order. The predicates here compare a candidate's position against
//! the stored pointer's position; the caller is responsible for reading both
//! positions from one consistent snapshot.
//!
//! A candidate with no known position (never seen locally, or still being
//! sent) cannot be shown to advance anything and is rejected. A stored
//! pointer whose event has dropped out of local timeline data is treated as
//! older than any known candidate.

use readmark_types::StreamOrdering;

/// Where the currently stored pointer sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredPointer {
    /// Nothing stored yet for this room (or room and user).
    Absent,
    /// A pointer is stored but its event has no known position.
    Untracked,
    /// The stored pointer's position.
    At(StreamOrdering),
}

impl StoredPointer {
    /// Build from the stored event's looked-up position.
    ///
    /// `stored` is whether a pointer row exists at all.
    pub fn from_lookup(stored: bool, position: Option<StreamOrdering>) -> Self {
        match (stored, position) {
            (false, _) => Self::Absent,
            (true, None) => Self::Untracked,
            (true, Some(position)) => Self::At(position),
        }
    }
}

fn advances(candidate: Option<StreamOrdering>, stored: StoredPointer) -> bool {
    match (candidate, stored) {
        (None, _) => false,
        (Some(_), StoredPointer::Absent | StoredPointer::Untracked) => true,
        (Some(candidate), StoredPointer::At(current)) => candidate > current,
    }
}

/// True iff writing the candidate would move the fully-read marker strictly
/// forward.
pub fn is_more_recent_than_stored(
    candidate: Option<StreamOrdering>,
    stored_marker: StoredPointer,
) -> bool {
    advances(candidate, stored_marker)
}

/// True iff the read receipt needs no advancement for this candidate.
///
/// Inverted sense compared to [`is_more_recent_than_stored`].
pub fn is_already_read(candidate: Option<StreamOrdering>, stored_receipt: StoredPointer) -> bool {
    !advances(candidate, stored_receipt)
}
