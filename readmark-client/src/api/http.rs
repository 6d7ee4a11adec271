//! HTTP implementation of [`ReadMarkersApi`].
//!
//! Sends `POST {homeserver}/_matrix/client/v3/rooms/{roomId}/read_markers`
//! with a bearer token and the JSON body `{"m.fully_read"?, "m.read"?}`.

use super::{ApiError, ReadMarkersApi};
use async_trait::async_trait;
use readmark_types::{ReadMarkersBody, RoomId};
use reqwest::{Client, Url};
use std::time::Duration;

/// Read-markers API backed by a homeserver over HTTP.
#[derive(Clone)]
pub struct HttpReadMarkersApi {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl HttpReadMarkersApi {
    /// Create an API client for the homeserver at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` cannot carry a path.
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            access_token: access_token.to_string(),
        })
    }

    /// Endpoint for `room_id`. The room id is percent-encoded as one path
    /// segment.
    pub fn endpoint(&self, room_id: &RoomId) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([
                "_matrix",
                "client",
                "v3",
                "rooms",
                room_id.as_str(),
                "read_markers",
            ]);
        Ok(url)
    }
}

impl std::fmt::Debug for HttpReadMarkersApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReadMarkersApi")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ReadMarkersApi for HttpReadMarkersApi {
    async fn set_read_markers(
        &self,
        room_id: &RoomId,
        body: &ReadMarkersBody,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(room_id)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Request(error.to_string())
    }
}
