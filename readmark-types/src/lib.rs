//! # readmark-types
//!
//! Shared types for readmark, the read-state reconciliation layer of a
//! federated chat client.
//!
//! This crate provides the foundational types used across all readmark crates:
//! - [`RoomId`], [`UserId`], [`EventId`], [`StreamOrdering`] - Identity and ordering types
//! - [`MarkerTargets`] - Where the fully-read marker and read receipt should move
//! - [`FullyReadContent`], [`ReadReceiptContent`] - Contents handed to marker handlers
//! - [`ReadMarkersBody`] - The remote `read_markers` request body
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod content;
mod error;
mod ids;

pub use content::{
    FullyReadContent, MarkerTargets, ReadMarkersBody, ReadReceiptContent, FULLY_READ_KEY,
    READ_RECEIPT_KEY,
};
pub use error::TypesError;
pub use ids::{EventId, RoomId, StreamOrdering, UserId, LOCAL_ECHO_PREFIX};
