//! Error types for readmark identifiers and wire payloads.

use thiserror::Error;

/// Errors raised while constructing readmark types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Identifier was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Identifier contained characters that are never valid.
    #[error("invalid {kind}: {value:?}")]
    InvalidId {
        /// Which identifier kind was being parsed.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A read-markers body must carry at least one key.
    #[error("read markers body is empty")]
    EmptyBody,
}
