//! Identity and ordering types for readmark.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Prefix reserved for client-generated placeholder event ids.
///
/// The homeserver never issues ids with this prefix, so a local echo can be
/// recognized without touching storage.
pub const LOCAL_ECHO_PREFIX: &str = "~local";

fn validate(kind: &'static str, value: &str) -> Result<(), TypesError> {
    if value.is_empty() {
        return Err(TypesError::Empty(kind));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(TypesError::InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an id, rejecting empty values and embedded whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, TypesError> {
                let value = value.into();
                validate($kind, &value)?;
                Ok(Self(value))
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a chat room.
    RoomId,
    "room id"
);

string_id!(
    /// Opaque identifier of a user account.
    UserId,
    "user id"
);

string_id!(
    /// Identifier of a timeline event.
    ///
    /// Server-assigned ids are globally unique within the deployment. Ids
    /// carrying [`LOCAL_ECHO_PREFIX`] are placeholders for events this client
    /// has sent but the server has not yet acknowledged.
    EventId,
    "event id"
);

impl EventId {
    /// Generate a fresh local-echo placeholder id (`~local$<uuid>`).
    pub fn local_echo() -> Self {
        Self(format!("{}${}", LOCAL_ECHO_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Whether this id is a client-generated placeholder.
    pub fn is_local_echo(&self) -> bool {
        self.0.starts_with(LOCAL_ECHO_PREFIX)
    }
}

/// Position of a committed event within its room's timeline.
///
/// Assigned by the event store in strictly increasing order as events are
/// committed. Larger means more recent.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct StreamOrdering(u64);

impl StreamOrdering {
    /// Create a StreamOrdering with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The position following this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for StreamOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StreamOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamOrdering({})", self.0)
    }
}
