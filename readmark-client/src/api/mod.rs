//! Homeserver API abstraction for readmark.
//!
//! The only remote call this crate makes is the room `read_markers`
//! request. It is abstracted behind [`ReadMarkersApi`] so the service can be
//! driven against the real homeserver ([`HttpReadMarkersApi`]) or a mock.
//!
//! # Retry classification
//!
//! [`ApiError::is_retryable`] separates transient failures (network,
//! timeout, rate limiting, server errors) from permanent ones. The notifier
//! retries only the former.

mod http;
mod mock;

pub use http::HttpReadMarkersApi;
pub use mock::MockReadMarkersApi;

use async_trait::async_trait;
use readmark_types::{ReadMarkersBody, RoomId};
use std::sync::Arc;
use thiserror::Error;

/// Homeserver API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The homeserver answered with a non-success status.
    #[error("homeserver returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The configured homeserver URL cannot address rooms.
    #[error("invalid homeserver url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) => false,
        }
    }
}

/// The remote side of read-marker propagation.
#[async_trait]
pub trait ReadMarkersApi: Send + Sync {
    /// Send the read markers of one room in a single request.
    async fn set_read_markers(
        &self,
        room_id: &RoomId,
        body: &ReadMarkersBody,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl<A: ReadMarkersApi + ?Sized> ReadMarkersApi for Arc<A> {
    async fn set_read_markers(
        &self,
        room_id: &RoomId,
        body: &ReadMarkersBody,
    ) -> Result<(), ApiError> {
        (**self).set_read_markers(room_id, body).await
    }
}
