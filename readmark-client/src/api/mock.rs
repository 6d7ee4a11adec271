//! Mock homeserver API for testing.
//!
//! Captures every read-markers request and allows queueing failures.

use super::{ApiError, ReadMarkersApi};
use async_trait::async_trait;
use readmark_types::{ReadMarkersBody, RoomId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock homeserver API for testing.
///
/// Clones share state, so a test can keep one handle while the service
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockReadMarkersApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug, Default)]
struct MockApiInner {
    sent: Vec<(RoomId, ReadMarkersBody)>,
    attempts: usize,
    failures: VecDeque<ApiError>,
}

impl MockReadMarkersApi {
    /// Create a new mock API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that succeeded, in order.
    pub fn sent(&self) -> Vec<(RoomId, ReadMarkersBody)> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// The last request that succeeded.
    pub fn last_sent(&self) -> Option<(RoomId, ReadMarkersBody)> {
        let inner = self.inner.lock().unwrap();
        inner.sent.last().cloned()
    }

    /// Calls made, including failed ones.
    pub fn attempts(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.attempts
    }

    /// Cause the next call to fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.push_back(error);
    }

    /// Clear all captured requests and queued failures.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockApiInner::default();
    }
}

#[async_trait]
impl ReadMarkersApi for MockReadMarkersApi {
    async fn set_read_markers(
        &self,
        room_id: &RoomId,
        body: &ReadMarkersBody,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;

        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }

        inner.sent.push((room_id.clone(), body.clone()));
        Ok(())
    }
}
