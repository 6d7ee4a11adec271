//! Marker contents and the read-markers request body.
//!
//! [`MarkerTargets`] is the in-process representation of "which pointers to
//! move where". It only becomes the string-keyed wire map
//! ([`ReadMarkersBody`]) at the remote boundary.

use serde::{Deserialize, Serialize};

use crate::{EventId, TypesError, UserId};

/// Wire key for the room's fully-read marker.
pub const FULLY_READ_KEY: &str = "m.fully_read";

/// Wire key for the acting user's read receipt.
pub const READ_RECEIPT_KEY: &str = "m.read";

/// Target events for the two read pointers of a room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTargets {
    /// New fully-read marker, if it should move.
    pub fully_read: Option<EventId>,
    /// New read receipt, if it should move.
    pub read_receipt: Option<EventId>,
}

impl MarkerTargets {
    /// No pointer moves.
    pub fn none() -> Self {
        Self::default()
    }

    /// True when neither pointer is set.
    pub fn is_empty(&self) -> bool {
        self.fully_read.is_none() && self.read_receipt.is_none()
    }

    /// Builder: set the fully-read target.
    pub fn with_fully_read(mut self, event_id: EventId) -> Self {
        self.fully_read = Some(event_id);
        self
    }

    /// Builder: set the read-receipt target.
    pub fn with_read_receipt(mut self, event_id: EventId) -> Self {
        self.read_receipt = Some(event_id);
        self
    }
}

/// Content handed to fully-read handlers after the marker is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullyReadContent {
    /// The event the room is now fully read up to.
    pub event_id: EventId,
}

/// Content handed to read-receipt handlers after the receipt is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptContent {
    /// The user the receipt belongs to.
    pub user_id: UserId,
    /// The event acknowledged as read.
    pub event_id: EventId,
    /// When the receipt was written (milliseconds since the UNIX epoch).
    pub timestamp: u64,
}

/// Body of the `read_markers` request.
///
/// Both keys are optional but the body is never empty; construct it through
/// [`ReadMarkersBody::from_targets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMarkersBody {
    /// Fully-read marker.
    #[serde(
        rename = "m.fully_read",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fully_read: Option<EventId>,
    /// Public read receipt.
    #[serde(rename = "m.read", default, skip_serializing_if = "Option::is_none")]
    pub read_receipt: Option<EventId>,
}

impl ReadMarkersBody {
    /// Build the wire body from resolved targets.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::EmptyBody`] if no target is set.
    pub fn from_targets(targets: &MarkerTargets) -> Result<Self, TypesError> {
        if targets.is_empty() {
            return Err(TypesError::EmptyBody);
        }
        Ok(Self {
            fully_read: targets.fully_read.clone(),
            read_receipt: targets.read_receipt.clone(),
        })
    }

    /// Number of keys carried by the body (one or two).
    pub fn len(&self) -> usize {
        usize::from(self.fully_read.is_some()) + usize::from(self.read_receipt.is_some())
    }

    /// Always false for bodies built through [`ReadMarkersBody::from_targets`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str) -> EventId {
        EventId::new(id).unwrap()
    }

    #[test]
    fn body_with_both_keys() {
        let targets = MarkerTargets::none()
            .with_fully_read(event("E5"))
            .with_read_receipt(event("E5"));
        let body = ReadMarkersBody::from_targets(&targets).unwrap();

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"m.fully_read": "E5", "m.read": "E5"})
        );
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn body_omits_absent_keys() {
        let targets = MarkerTargets::none().with_read_receipt(event("E4"));
        let body = ReadMarkersBody::from_targets(&targets).unwrap();

        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"m.read": "E4"}));
    }

    #[test]
    fn empty_targets_never_produce_a_body() {
        let result = ReadMarkersBody::from_targets(&MarkerTargets::none());
        assert!(matches!(result, Err(TypesError::EmptyBody)));
    }

    #[test]
    fn keys_match_wire_constants() {
        let body = ReadMarkersBody::from_targets(
            &MarkerTargets::none()
                .with_fully_read(event("E1"))
                .with_read_receipt(event("E2")),
        )
        .unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value[FULLY_READ_KEY], "E1");
        assert_eq!(value[READ_RECEIPT_KEY], "E2");
    }

    #[test]
    fn receipt_content_serializes_all_fields() {
        let content = ReadReceiptContent {
            user_id: UserId::new("@alice:example.org").unwrap(),
            event_id: event("E3"),
            timestamp: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["user_id"], "@alice:example.org");
        assert_eq!(value["event_id"], "E3");
        assert_eq!(value["timestamp"], 1_700_000_000_000u64);
    }
}
