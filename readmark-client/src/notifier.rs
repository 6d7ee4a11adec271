//! Remote notification of committed read markers.
//!
//! Runs after the local write has committed. Retryable failures are retried
//! with backoff; a failure that survives the retries is reported but never
//! undoes local state. The next successful request or the next full sync
//! reconciles the homeserver.

use readmark_core::Backoff;
use readmark_types::{MarkerTargets, ReadMarkersBody, RoomId};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::api::ReadMarkersApi;
use crate::config::NotifyConfig;
use crate::error::NotifyError;

/// Sends committed markers to the homeserver.
pub struct RemoteNotifier<A: ReadMarkersApi> {
    api: Arc<A>,
    max_attempts: u32,
    backoff: Backoff,
}

impl<A: ReadMarkersApi> Clone for RemoteNotifier<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            max_attempts: self.max_attempts,
            backoff: self.backoff,
        }
    }
}

impl<A: ReadMarkersApi + 'static> RemoteNotifier<A> {
    /// Create a notifier using `config`'s retry policy.
    pub fn new(api: A, config: &NotifyConfig) -> Self {
        Self {
            api: Arc::new(api),
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
        }
    }

    /// Send `written` for `room_id` as one request, retrying transient
    /// failures.
    pub async fn notify(&self, room_id: &RoomId, written: &MarkerTargets) -> Result<(), NotifyError> {
        let body = ReadMarkersBody::from_targets(written)?;
        let mut attempt = 1;

        loop {
            match self.api.set_read_markers(room_id, &body).await {
                Ok(()) => {
                    tracing::debug!(room_id = %room_id, attempt, "read markers sent");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        room_id = %room_id,
                        attempt,
                        ?delay,
                        "read markers request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(NotifyError::Api {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Run [`RemoteNotifier::notify`] on the runtime, independent of the
    /// caller's lifetime.
    pub fn spawn(&self, room_id: RoomId, written: MarkerTargets) -> RemoteNotification {
        let notifier = self.clone();
        let handle = tokio::spawn(async move {
            let result = notifier.notify(&room_id, &written).await;
            if let Err(e) = &result {
                tracing::warn!(room_id = %room_id, "read markers not delivered: {}", e);
            }
            result
        });
        RemoteNotification { handle }
    }
}

/// Handle to a detached remote notification.
///
/// Dropping the handle does not cancel the notification.
#[derive(Debug)]
pub struct RemoteNotification {
    handle: JoinHandle<Result<(), NotifyError>>,
}

impl RemoteNotification {
    /// Wait for the notification to finish.
    pub async fn wait(self) -> Result<(), NotifyError> {
        self.handle
            .await
            .map_err(|e| NotifyError::Join(e.to_string()))?
    }
}
