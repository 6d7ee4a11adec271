//! Error types for readmark-client.

use readmark_types::TypesError;

use crate::api::ApiError;

/// Main error type for read-marker operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Local store error. The invocation was aborted; nothing was written.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Remote notification failed. Local state is already committed.
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A marker handler failed inside the write transaction.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A stored row could not be turned back into a typed value.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Remote notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The homeserver call failed and will not be retried further.
    #[error("read markers request failed after {attempts} attempt(s): {source}")]
    Api {
        /// Number of attempts made.
        attempts: u32,
        /// The last failure.
        #[source]
        source: ApiError,
    },

    /// Nothing to send.
    #[error("invalid request body: {0}")]
    Body(#[from] TypesError),

    /// The background notification task panicked or was aborted.
    #[error("notification task failed: {0}")]
    Join(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_error_reports_attempts() {
        let err = NotifyError::Api {
            attempts: 3,
            source: ApiError::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "read markers request failed after 3 attempt(s): request timed out"
        );
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
        assert_send_sync::<StoreError>();
        assert_send_sync::<NotifyError>();
    }
}
