//! Local-echo filtering.
//!
//! A local echo is the placeholder id of an event this client sent but the
//! server has not acknowledged yet. Pointing a marker at one would publish an
//! id nobody else can resolve, so such targets are dropped. Dropping one is
//! not an error.

use readmark_types::{EventId, RoomId};

/// Whether `event_id` is a client-generated placeholder.
///
/// Pure shape check; never touches storage.
pub fn is_local_echo(event_id: &EventId) -> bool {
    event_id.is_local_echo()
}

/// Pass `target` through unless it is a local echo.
///
/// `key` names the pointer (`m.fully_read` or `m.read`) for the log line.
pub fn reject_local_echo(room_id: &RoomId, key: &str, target: Option<EventId>) -> Option<EventId> {
    match target {
        Some(event_id) if is_local_echo(&event_id) => {
            tracing::warn!(
                room_id = %room_id,
                key,
                event_id = %event_id,
                "ignoring local echo as read marker target"
            );
            None
        }
        other => other,
    }
}
