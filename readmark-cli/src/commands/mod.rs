//! CLI command implementations.

pub mod append;
pub mod mark_read;
pub mod status;

use anyhow::{Context, Result};
use readmark_client::{Config, SqliteStore};
use readmark_types::{EventId, RoomId};

/// Open the local store named by the configuration.
pub async fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::new(&config.storage.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open database {}",
                config.storage.database.display()
            )
        })
}

pub(crate) fn parse_room(room: &str) -> Result<RoomId> {
    RoomId::new(room).context("Invalid room id")
}

pub(crate) fn parse_event(event: &str) -> Result<EventId> {
    EventId::new(event).context("Invalid event id")
}
