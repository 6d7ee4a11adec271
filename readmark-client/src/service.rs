//! ReadMarkerService - the entry point for moving read pointers.
//!
//! # Architecture
//!
//! The service uses pure resolution logic (from readmark-core) and performs
//! the I/O around it:
//!
//! ```text
//! MarkerRequest → SqliteStore::read_state ─► readmark-core::plan
//!                                                   │
//!                       SqliteStore::apply_atomically (one transaction)
//!                                                   │ committed
//!                                                   ▼
//!                                  RemoteNotifier::spawn (detached)
//! ```
//!
//! A request that resolves to no change touches neither the store nor the
//! homeserver, so repeating an applied request is a no-op.
//!
//! # Example
//!
//! ```ignore
//! use readmark_client::{MockReadMarkersApi, NotifyConfig, ReadMarkerService, SqliteStore};
//! use readmark_core::MarkerRequest;
//!
//! let store = SqliteStore::in_memory().await?;
//! let service = ReadMarkerService::new(store, user_id, MockReadMarkersApi::new(), &NotifyConfig::default());
//!
//! let outcome = service.set_read_markers(MarkerRequest::mark_all_read(room_id)).await?;
//! outcome.remote_result().await?;
//! ```

use readmark_core::{plan, MarkerRequest};
use readmark_types::{MarkerTargets, RoomId, UserId};

use crate::api::ReadMarkersApi;
use crate::config::NotifyConfig;
use crate::error::ClientError;
use crate::notifier::{RemoteNotification, RemoteNotifier};
use crate::store::{Handlers, SqliteStore};

/// What a call to [`ReadMarkerService::set_read_markers`] did.
#[derive(Debug)]
pub struct MarkerOutcome {
    /// Pointers that moved locally.
    pub written: MarkerTargets,
    /// Whether the room summary's unread counters were reset.
    pub summary_reset: bool,
    /// The in-flight homeserver notification, if anything moved.
    pub remote: Option<RemoteNotification>,
}

impl MarkerOutcome {
    fn unchanged() -> Self {
        Self {
            written: MarkerTargets::none(),
            summary_reset: false,
            remote: None,
        }
    }

    /// Whether any pointer moved.
    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }

    /// Wait for the homeserver notification, if one was started.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Notify`] if the homeserver was not told. Local
    /// state stays committed.
    pub async fn remote_result(self) -> Result<(), ClientError> {
        if let Some(notification) = self.remote {
            notification.wait().await?;
        }
        Ok(())
    }
}

/// Moves a user's read pointers, locally and on the homeserver.
pub struct ReadMarkerService<A: ReadMarkersApi> {
    store: SqliteStore,
    user_id: UserId,
    notifier: RemoteNotifier<A>,
    handlers: Handlers,
}

impl<A: ReadMarkersApi + 'static> ReadMarkerService<A> {
    /// Create a service acting as `user_id`.
    pub fn new(store: SqliteStore, user_id: UserId, api: A, notify: &NotifyConfig) -> Self {
        Self {
            store,
            user_id,
            notifier: RemoteNotifier::new(api, notify),
            handlers: Handlers::default(),
        }
    }

    /// Use `handlers` for marker-applied and receipt-applied callbacks.
    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// The acting user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The underlying store.
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Resolve `request`, apply it locally and notify the homeserver.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if reading or writing local state
    /// fails; nothing is written and nothing is sent in that case. Remote
    /// failures are reported through [`MarkerOutcome::remote`].
    pub async fn set_read_markers(&self, request: MarkerRequest) -> Result<MarkerOutcome, ClientError> {
        let room_id = &request.room_id;
        let state = self.store.read_state(&self.user_id, &request).await?;
        let plan = plan(room_id, state.effective.clone(), &state.snapshot);

        if !plan.writes_locally() {
            tracing::debug!(room_id = %room_id, "read markers already up to date");
            return Ok(MarkerOutcome::unchanged());
        }

        let applied = self
            .store
            .apply_atomically(
                room_id,
                &self.user_id,
                &plan.staged,
                state
                    .effective
                    .read_receipt
                    .as_ref()
                    .filter(|_| plan.reset_summary),
                &self.handlers,
            )
            .await?;

        let remote = if applied.written.is_empty() {
            None
        } else {
            Some(self.notifier.spawn(room_id.clone(), applied.written.clone()))
        };

        Ok(MarkerOutcome {
            written: applied.written,
            summary_reset: applied.summary_reset,
            remote,
        })
    }

    /// Move both pointers of `room_id` to the latest synced event.
    pub async fn mark_room_read(&self, room_id: RoomId) -> Result<MarkerOutcome, ClientError> {
        self.set_read_markers(MarkerRequest::mark_all_read(room_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockReadMarkersApi};
    use crate::store::{ContentHandler, RoomSummary};
    use crate::error::{NotifyError, StoreError};
    use async_trait::async_trait;
    use readmark_types::{EventId, FullyReadContent, ReadMarkersBody};
    use serde_json::json;
    use sqlx::SqliteConnection;
    use std::sync::Arc;

    fn room() -> RoomId {
        RoomId::new("!room:example.org").unwrap()
    }

    fn alice() -> UserId {
        UserId::new("@alice:example.org").unwrap()
    }

    fn event(id: &str) -> EventId {
        EventId::new(id).unwrap()
    }

    fn unread() -> RoomSummary {
        RoomSummary {
            unread_notification_count: 3,
            unread_highlight_count: 1,
            has_unread_messages: true,
        }
    }

    fn fast_notify() -> NotifyConfig {
        NotifyConfig {
            max_attempts: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Room with events E1..=E5 and an unread summary.
    async fn setup() -> (ReadMarkerService<MockReadMarkersApi>, MockReadMarkersApi) {
        let store = SqliteStore::in_memory().await.unwrap();
        for i in 1..=5 {
            store
                .append_event(&room(), &event(&format!("E{i}")), false)
                .await
                .unwrap();
        }
        store.upsert_room_summary(&room(), unread()).await.unwrap();

        let api = MockReadMarkersApi::new();
        let service = ReadMarkerService::new(store, alice(), api.clone(), &fast_notify());
        (service, api)
    }

    fn body_json(body: &ReadMarkersBody) -> serde_json::Value {
        serde_json::to_value(body).unwrap()
    }

    // ===========================================
    // Scenarios
    // ===========================================

    #[tokio::test]
    async fn mark_room_read_moves_both_pointers_to_latest() {
        let (service, api) = setup().await;

        let outcome = service.mark_room_read(room()).await.unwrap();
        assert!(outcome.summary_reset);
        outcome.remote_result().await.unwrap();

        let store = service.store();
        assert_eq!(store.read_marker(&room()).await.unwrap(), Some(event("E5")));
        let receipt = store.read_receipt(&room(), &alice()).await.unwrap().unwrap();
        assert_eq!(receipt.event_id, event("E5"));
        assert!(store.room_summary(&room()).await.unwrap().unwrap().is_read());

        let sent = api.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, room());
        assert_eq!(
            body_json(&sent[0].1),
            json!({"m.fully_read": "E5", "m.read": "E5"})
        );
    }

    #[tokio::test]
    async fn older_fully_read_target_is_ignored() {
        let (service, api) = setup().await;
        service
            .set_read_markers(MarkerRequest::new(room()).fully_read(event("E5")))
            .await
            .unwrap()
            .remote_result()
            .await
            .unwrap();
        api.reset();

        let outcome = service
            .set_read_markers(MarkerRequest::new(room()).fully_read(event("E3")))
            .await
            .unwrap();

        assert!(!outcome.changed());
        assert!(outcome.remote.is_none());
        assert_eq!(
            service.store().read_marker(&room()).await.unwrap(),
            Some(event("E5"))
        );
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn local_echo_receipt_is_ignored() {
        let (service, api) = setup().await;
        let echo = event("~local$abc");
        service.store().append_event(&room(), &echo, true).await.unwrap();

        let outcome = service
            .set_read_markers(MarkerRequest::new(room()).read_receipt(echo))
            .await
            .unwrap();

        assert!(!outcome.changed());
        assert!(outcome.remote.is_none());
        assert_eq!(service.store().read_receipt(&room(), &alice()).await.unwrap(), None);
        assert_eq!(
            service.store().room_summary(&room()).await.unwrap(),
            Some(unread())
        );
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn receipt_behind_latest_keeps_summary() {
        let (service, api) = setup().await;

        let outcome = service
            .set_read_markers(MarkerRequest::new(room()).read_receipt(event("E4")))
            .await
            .unwrap();
        assert!(!outcome.summary_reset);
        outcome.remote_result().await.unwrap();

        let receipt = service
            .store()
            .read_receipt(&room(), &alice())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.event_id, event("E4"));
        assert_eq!(
            service.store().room_summary(&room()).await.unwrap(),
            Some(unread())
        );
        assert_eq!(body_json(&api.sent()[0].1), json!({"m.read": "E4"}));
    }

    // ===========================================
    // Properties
    // ===========================================

    #[tokio::test]
    async fn pointers_never_move_backward() {
        let (service, _api) = setup().await;
        service
            .set_read_markers(
                MarkerRequest::new(room())
                    .fully_read(event("E4"))
                    .read_receipt(event("E4")),
            )
            .await
            .unwrap();

        service
            .set_read_markers(
                MarkerRequest::new(room())
                    .fully_read(event("E2"))
                    .read_receipt(event("E2")),
            )
            .await
            .unwrap();

        let store = service.store();
        assert_eq!(store.read_marker(&room()).await.unwrap(), Some(event("E4")));
        assert_eq!(
            store.read_receipt(&room(), &alice()).await.unwrap().unwrap().event_id,
            event("E4")
        );
    }

    #[tokio::test]
    async fn repeating_an_applied_request_is_a_noop() {
        let (service, api) = setup().await;
        let request = MarkerRequest::mark_all_read(room());

        service
            .set_read_markers(request.clone())
            .await
            .unwrap()
            .remote_result()
            .await
            .unwrap();
        let receipt_before = service
            .store()
            .read_receipt(&room(), &alice())
            .await
            .unwrap();

        let outcome = service.set_read_markers(request).await.unwrap();

        assert!(!outcome.changed());
        assert!(outcome.remote.is_none());
        assert_eq!(api.attempts(), 1);
        assert_eq!(
            service.store().read_receipt(&room(), &alice()).await.unwrap(),
            receipt_before
        );
    }

    #[tokio::test]
    async fn never_seen_target_is_rejected() {
        let (service, api) = setup().await;

        let outcome = service
            .set_read_markers(MarkerRequest::new(room()).fully_read(event("E404")))
            .await
            .unwrap();

        assert!(!outcome.changed());
        assert_eq!(service.store().read_marker(&room()).await.unwrap(), None);
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn force_on_empty_room_does_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        let api = MockReadMarkersApi::new();
        let service = ReadMarkerService::new(store, alice(), api.clone(), &fast_notify());

        let outcome = service.mark_room_read(room()).await.unwrap();

        assert!(!outcome.changed());
        assert!(!outcome.summary_reset);
        assert_eq!(api.attempts(), 0);
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_state() {
        let (service, api) = setup().await;
        api.fail_next(ApiError::Timeout);
        api.fail_next(ApiError::Timeout);

        let outcome = service.mark_room_read(room()).await.unwrap();
        let result = outcome.remote_result().await;

        assert!(matches!(
            result,
            Err(ClientError::Notify(NotifyError::Api { attempts: 2, .. }))
        ));
        assert_eq!(
            service.store().read_marker(&room()).await.unwrap(),
            Some(event("E5"))
        );
        assert!(service
            .store()
            .room_summary(&room())
            .await
            .unwrap()
            .unwrap()
            .is_read());
    }

    struct FailingMarkerHandler;

    #[async_trait]
    impl ContentHandler<FullyReadContent> for FailingMarkerHandler {
        async fn handle(
            &self,
            _conn: &mut SqliteConnection,
            _room_id: &RoomId,
            _content: &FullyReadContent,
        ) -> Result<(), StoreError> {
            Err(StoreError::Handler("sync model unavailable".into()))
        }
    }

    #[tokio::test]
    async fn local_write_failure_sends_nothing() {
        let (service, api) = setup().await;
        let service = service.with_handlers(Handlers::new(
            Arc::new(FailingMarkerHandler),
            Arc::new(crate::store::NoopHandler),
        ));

        let result = service.mark_room_read(room()).await;

        assert!(matches!(result, Err(ClientError::Store(StoreError::Handler(_)))));
        let store = service.store();
        assert_eq!(store.read_marker(&room()).await.unwrap(), None);
        assert_eq!(store.read_receipt(&room(), &alice()).await.unwrap(), None);
        assert_eq!(store.room_summary(&room()).await.unwrap(), Some(unread()));
        assert_eq!(api.attempts(), 0);
    }

    struct ParkedMarkerHandler;

    #[async_trait]
    impl ContentHandler<FullyReadContent> for ParkedMarkerHandler {
        async fn handle(
            &self,
            _conn: &mut SqliteConnection,
            _room_id: &RoomId,
            _content: &FullyReadContent,
        ) -> Result<(), StoreError> {
            std::future::pending::<Result<(), StoreError>>().await
        }
    }

    #[tokio::test]
    async fn cancelled_before_commit_writes_nothing() {
        let (service, api) = setup().await;
        let parked = service.with_handlers(Handlers::new(
            Arc::new(ParkedMarkerHandler),
            Arc::new(crate::store::NoopHandler),
        ));

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            parked.mark_room_read(room()),
        )
        .await;
        assert!(result.is_err());

        let store = parked.store().clone();
        assert_eq!(store.read_marker(&room()).await.unwrap(), None);
        assert_eq!(store.read_receipt(&room(), &alice()).await.unwrap(), None);
        assert_eq!(store.room_summary(&room()).await.unwrap(), Some(unread()));
        assert_eq!(api.attempts(), 0);

        // The write lock was released with the dropped call.
        let service = ReadMarkerService::new(store, alice(), api.clone(), &fast_notify());
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            service.mark_room_read(room()),
        )
        .await
        .expect("write lock still held")
        .unwrap();
        assert!(outcome.summary_reset);
        outcome.remote_result().await.unwrap();
        assert_eq!(
            service.store().read_marker(&room()).await.unwrap(),
            Some(event("E5"))
        );
        assert_eq!(api.attempts(), 1);
    }

    // ===========================================
    // Concurrency
    // ===========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_settle_on_most_recent() {
        let (service, api) = setup().await;
        let service = Arc::new(service);

        let mut tasks = Vec::new();
        for id in ["E2", "E5", "E3", "E4", "E1"] {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                let outcome = service
                    .set_read_markers(
                        MarkerRequest::new(room())
                            .fully_read(event(id))
                            .read_receipt(event(id)),
                    )
                    .await
                    .unwrap();
                outcome.remote_result().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let store = service.store();
        assert_eq!(store.read_marker(&room()).await.unwrap(), Some(event("E5")));
        assert_eq!(
            store.read_receipt(&room(), &alice()).await.unwrap().unwrap().event_id,
            event("E5")
        );
        // Every request that reached the server moved a pointer forward.
        assert!(api.sent().len() <= 5);
        assert!(!api.sent().is_empty());
    }
}
