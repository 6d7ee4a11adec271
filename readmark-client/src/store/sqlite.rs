//! SQLite backend for the read-state store.

use super::{ApplyOutcome, Handlers, RoomReadState, RoomSummary};
use crate::error::StoreError;
use readmark_core::{
    effective_targets, is_already_read, is_more_recent_than_stored, MarkerRequest,
    ReadStateSnapshot, StoredPointer,
};
use readmark_types::{
    EventId, FullyReadContent, MarkerTargets, ReadReceiptContent, RoomId, StreamOrdering, UserId,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqliteConnection;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// SQLite-based read-state store.
///
/// Uses WAL mode for concurrent reads. Writes are serialized through an
/// async lock held for the whole transaction, so two writers never
/// interleave inside one atomic unit.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // One connection that never expires: each connection to :memory:
        // is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS room_orderings (
                room_id TEXT PRIMARY KEY,
                next_ordering INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeline_events (
                event_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                stream_ordering INTEGER NOT NULL,
                sending INTEGER NOT NULL DEFAULT 0,
                UNIQUE(room_id, stream_ordering)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS read_markers (
                room_id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS read_receipts (
                room_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (room_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS room_summaries (
                room_id TEXT PRIMARY KEY,
                unread_notification_count INTEGER NOT NULL DEFAULT 0,
                unread_highlight_count INTEGER NOT NULL DEFAULT 0,
                has_unread_messages INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ===========================================
    // Timeline
    // ===========================================

    /// Record an event in the room timeline and assign its stream ordering.
    ///
    /// `sending` marks a local echo still waiting for the server.
    pub async fn append_event(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
        sending: bool,
    ) -> Result<StreamOrdering, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let ordering = next_ordering(&mut tx, room_id).await?;
        sqlx::query(
            r#"
            INSERT INTO timeline_events (event_id, room_id, stream_ordering, sending)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(event_id.as_str())
        .bind(room_id.as_str())
        .bind(ordering.value() as i64)
        .bind(sending)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ordering)
    }

    /// Replace a local echo with its server-assigned id.
    ///
    /// The event is committed now, so it gets a fresh stream ordering.
    /// Returns `None` if no pending event with `local_id` exists.
    pub async fn confirm_sent(
        &self,
        room_id: &RoomId,
        local_id: &EventId,
        server_id: &EventId,
    ) -> Result<Option<StreamOrdering>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let ordering = next_ordering(&mut tx, room_id).await?;
        let result = sqlx::query(
            r#"
            UPDATE timeline_events
            SET event_id = ?1, stream_ordering = ?2, sending = 0
            WHERE room_id = ?3 AND event_id = ?4 AND sending = 1
            "#,
        )
        .bind(server_id.as_str())
        .bind(ordering.value() as i64)
        .bind(room_id.as_str())
        .bind(local_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(ordering))
    }

    /// The most recent event of the room that is not pending send.
    pub async fn latest_synced_event(&self, room_id: &RoomId) -> Result<Option<EventId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        latest_synced(&mut conn, room_id).await
    }

    /// Stream ordering of a synced event, `None` if unknown or still sending.
    pub async fn stream_ordering(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
    ) -> Result<Option<StreamOrdering>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        synced_position(&mut conn, room_id, Some(event_id)).await
    }

    // ===========================================
    // Monotonicity
    // ===========================================

    /// Whether `candidate` would move the room's fully-read marker forward.
    pub async fn is_more_recent_than_stored(
        &self,
        room_id: &RoomId,
        candidate: &EventId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let position = synced_position(&mut tx, room_id, Some(candidate)).await?;
        let stored = stored_marker(&mut tx, room_id).await?;
        tx.commit().await?;
        Ok(is_more_recent_than_stored(position, stored))
    }

    /// Whether `user_id`'s receipt in the room is already at or past `candidate`.
    pub async fn is_already_read(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        candidate: &EventId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let position = synced_position(&mut tx, room_id, Some(candidate)).await?;
        let stored = stored_receipt(&mut tx, room_id, user_id).await?;
        tx.commit().await?;
        Ok(is_already_read(position, stored))
    }

    /// Read everything needed to plan `request` from one snapshot.
    pub async fn read_state(
        &self,
        user_id: &UserId,
        request: &MarkerRequest,
    ) -> Result<RoomReadState, StoreError> {
        let room_id = &request.room_id;
        let mut tx = self.pool.begin().await?;

        let latest = latest_synced(&mut tx, room_id).await?;
        let effective = effective_targets(request, latest.as_ref());
        let fully_read_position =
            synced_position(&mut tx, room_id, effective.fully_read.as_ref()).await?;
        let read_receipt_position =
            synced_position(&mut tx, room_id, effective.read_receipt.as_ref()).await?;
        let stored_marker = stored_marker(&mut tx, room_id).await?;
        let stored_receipt = stored_receipt(&mut tx, room_id, user_id).await?;

        tx.commit().await?;

        Ok(RoomReadState {
            effective,
            snapshot: ReadStateSnapshot {
                latest,
                stored_marker,
                stored_receipt,
                fully_read_position,
                read_receipt_position,
            },
        })
    }

    // ===========================================
    // Atomic write
    // ===========================================

    /// Write the staged pointers and the summary reset as one unit.
    ///
    /// Monotonicity is checked again against the stored state inside the
    /// transaction; a target overtaken by a concurrent write is skipped.
    /// `reset_summary_for` is the receipt target the summary reset was
    /// planned for. The counters are cleared only if, inside the
    /// transaction, that target is still the latest synced event or the
    /// stored receipt is at or after it.
    /// If any step or handler fails, nothing is written.
    pub async fn apply_atomically(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        staged: &MarkerTargets,
        reset_summary_for: Option<&EventId>,
        handlers: &Handlers,
    ) -> Result<ApplyOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut written = MarkerTargets::none();

        if let Some(event_id) = &staged.fully_read {
            let position = synced_position(&mut tx, room_id, Some(event_id)).await?;
            let stored = stored_marker(&mut tx, room_id).await?;

            if is_more_recent_than_stored(position, stored) {
                sqlx::query(
                    r#"
                    INSERT INTO read_markers (room_id, event_id)
                    VALUES (?1, ?2)
                    ON CONFLICT(room_id) DO UPDATE SET event_id = excluded.event_id
                    "#,
                )
                .bind(room_id.as_str())
                .bind(event_id.as_str())
                .execute(&mut *tx)
                .await?;

                let content = FullyReadContent {
                    event_id: event_id.clone(),
                };
                handlers.fully_read.handle(&mut tx, room_id, &content).await?;
                written.fully_read = Some(event_id.clone());
            } else {
                tracing::debug!(
                    room_id = %room_id,
                    event_id = %event_id,
                    "fully-read marker overtaken before write"
                );
            }
        }

        if let Some(event_id) = &staged.read_receipt {
            let position = synced_position(&mut tx, room_id, Some(event_id)).await?;
            let stored = stored_receipt(&mut tx, room_id, user_id).await?;

            if !is_already_read(position, stored) {
                let timestamp = now_millis();
                sqlx::query(
                    r#"
                    INSERT INTO read_receipts (room_id, user_id, event_id, timestamp)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(room_id, user_id) DO UPDATE
                    SET event_id = excluded.event_id, timestamp = excluded.timestamp
                    "#,
                )
                .bind(room_id.as_str())
                .bind(user_id.as_str())
                .bind(event_id.as_str())
                .bind(timestamp as i64)
                .execute(&mut *tx)
                .await?;

                let content = ReadReceiptContent {
                    user_id: user_id.clone(),
                    event_id: event_id.clone(),
                    timestamp,
                };
                handlers.read_receipt.handle(&mut tx, room_id, &content).await?;
                written.read_receipt = Some(event_id.clone());
            } else {
                tracing::debug!(
                    room_id = %room_id,
                    event_id = %event_id,
                    "read receipt overtaken before write"
                );
            }
        }

        let summary_reset = match reset_summary_for {
            Some(target) => reset_summary(&mut tx, room_id, user_id, target).await?,
            None => false,
        };

        tx.commit().await?;

        tracing::info!(
            room_id = %room_id,
            fully_read = ?written.fully_read,
            read_receipt = ?written.read_receipt,
            summary_reset,
            "read state committed"
        );

        Ok(ApplyOutcome {
            written,
            summary_reset,
        })
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// The room's stored fully-read marker.
    pub async fn read_marker(&self, room_id: &RoomId) -> Result<Option<EventId>, StoreError> {
        let event_id: Option<String> =
            sqlx::query_scalar("SELECT event_id FROM read_markers WHERE room_id = ?1")
                .bind(room_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        event_id.map(parse_event_id).transpose()
    }

    /// The stored read receipt of `user_id` in the room.
    pub async fn read_receipt(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<ReadReceiptContent>, StoreError> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT event_id, timestamp FROM read_receipts WHERE room_id = ?1 AND user_id = ?2",
        )
        .bind(room_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(event_id, timestamp)| -> Result<_, StoreError> {
            Ok(ReadReceiptContent {
                user_id: user_id.clone(),
                event_id: parse_event_id(event_id)?,
                timestamp: timestamp as u64,
            })
        })
        .transpose()
    }

    /// The room's summary row, if one exists.
    pub async fn room_summary(&self, room_id: &RoomId) -> Result<Option<RoomSummary>, StoreError> {
        let row: Option<(i64, i64, bool)> = sqlx::query_as(
            r#"
            SELECT unread_notification_count, unread_highlight_count, has_unread_messages
            FROM room_summaries
            WHERE room_id = ?1
            "#,
        )
        .bind(room_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(notifications, highlights, has_unread)| -> Result<_, StoreError> {
            Ok(RoomSummary {
                unread_notification_count: to_count(notifications)?,
                unread_highlight_count: to_count(highlights)?,
                has_unread_messages: has_unread,
            })
        })
        .transpose()
    }

    /// Create or replace the room's summary row.
    pub async fn upsert_room_summary(
        &self,
        room_id: &RoomId,
        summary: RoomSummary,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO room_summaries
                (room_id, unread_notification_count, unread_highlight_count, has_unread_messages)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(room_id) DO UPDATE SET
                unread_notification_count = excluded.unread_notification_count,
                unread_highlight_count = excluded.unread_highlight_count,
                has_unread_messages = excluded.has_unread_messages
            "#,
        )
        .bind(room_id.as_str())
        .bind(i64::from(summary.unread_notification_count))
        .bind(i64::from(summary.unread_highlight_count))
        .bind(summary.has_unread_messages)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Atomically get and increment the stream ordering for a room.
async fn next_ordering(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
) -> Result<StreamOrdering, StoreError> {
    let ordering: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO room_orderings (room_id, next_ordering)
        VALUES (?1, 2)
        ON CONFLICT(room_id) DO UPDATE SET next_ordering = next_ordering + 1
        RETURNING next_ordering - 1
        "#,
    )
    .bind(room_id.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(StreamOrdering::new(ordering as u64))
}

async fn latest_synced(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
) -> Result<Option<EventId>, StoreError> {
    let event_id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT event_id FROM timeline_events
        WHERE room_id = ?1 AND sending = 0
        ORDER BY stream_ordering DESC
        LIMIT 1
        "#,
    )
    .bind(room_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    event_id.map(parse_event_id).transpose()
}

/// Position of a synced event. Local echoes never have one.
async fn synced_position(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
    event_id: Option<&EventId>,
) -> Result<Option<StreamOrdering>, StoreError> {
    let Some(event_id) = event_id.filter(|id| !id.is_local_echo()) else {
        return Ok(None);
    };

    let ordering: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT stream_ordering FROM timeline_events
        WHERE room_id = ?1 AND event_id = ?2 AND sending = 0
        "#,
    )
    .bind(room_id.as_str())
    .bind(event_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(ordering.map(|o| StreamOrdering::new(o as u64)))
}

async fn stored_marker(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
) -> Result<StoredPointer, StoreError> {
    let row: Option<(String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT m.event_id, t.stream_ordering
        FROM read_markers m
        LEFT JOIN timeline_events t
            ON t.event_id = m.event_id AND t.room_id = m.room_id AND t.sending = 0
        WHERE m.room_id = ?1
        "#,
    )
    .bind(room_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(to_stored_pointer(row))
}

async fn stored_receipt(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
    user_id: &UserId,
) -> Result<StoredPointer, StoreError> {
    let row: Option<(String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT r.event_id, t.stream_ordering
        FROM read_receipts r
        LEFT JOIN timeline_events t
            ON t.event_id = r.event_id AND t.room_id = r.room_id AND t.sending = 0
        WHERE r.room_id = ?1 AND r.user_id = ?2
        "#,
    )
    .bind(room_id.as_str())
    .bind(user_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(to_stored_pointer(row))
}

/// Clear the room's unread counters if the user's receipt covers the latest
/// synced event. Returns whether a summary row was reset.
async fn reset_summary(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
    user_id: &UserId,
    target: &EventId,
) -> Result<bool, StoreError> {
    let Some(latest) = latest_synced(&mut *conn, room_id).await? else {
        return Ok(false);
    };

    let covered = if *target == latest {
        true
    } else {
        let latest_position = synced_position(&mut *conn, room_id, Some(&latest)).await?;
        let stored = stored_receipt(&mut *conn, room_id, user_id).await?;
        matches!(
            (latest_position, stored),
            (Some(latest_at), StoredPointer::At(receipt)) if receipt >= latest_at
        )
    };

    if !covered {
        tracing::debug!(
            room_id = %room_id,
            target = %target,
            latest = %latest,
            "newer event synced, unread counters kept"
        );
        return Ok(false);
    }

    let result = sqlx::query(
        r#"
        UPDATE room_summaries
        SET unread_notification_count = 0,
            unread_highlight_count = 0,
            has_unread_messages = 0
        WHERE room_id = ?1
        "#,
    )
    .bind(room_id.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn to_stored_pointer(row: Option<(String, Option<i64>)>) -> StoredPointer {
    match row {
        None => StoredPointer::Absent,
        Some((_, ordering)) => {
            StoredPointer::from_lookup(true, ordering.map(|o| StreamOrdering::new(o as u64)))
        }
    }
}

fn parse_event_id(raw: String) -> Result<EventId, StoreError> {
    EventId::new(raw).map_err(|e| StoreError::InvalidRow(e.to_string()))
}

fn to_count(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("bad counter: {value}")))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
