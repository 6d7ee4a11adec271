//! Show the read state of a room.

use anyhow::Result;
use readmark_client::{Config, RoomSummary, SqliteStore};
use readmark_types::{EventId, RoomId, UserId};

use super::{open_store, parse_room};
use crate::config::user_id;

/// Read state of one room, as shown by `readmark status`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RoomStatus {
    /// Latest event that is not pending send.
    pub latest: Option<EventId>,
    /// Fully-read marker.
    pub fully_read: Option<EventId>,
    /// The user's read receipt.
    pub read_receipt: Option<EventId>,
    /// Unread counters, if the room has a summary.
    pub summary: Option<RoomSummary>,
}

/// Run the status command.
pub async fn run(config: &Config, room: &str) -> Result<RoomStatus> {
    let room_id = parse_room(room)?;
    let user_id = user_id(config)?;
    let store = open_store(config).await?;

    let status = load(&store, &room_id, &user_id).await?;
    print(&room_id, &user_id, &status);
    Ok(status)
}

async fn load(store: &SqliteStore, room_id: &RoomId, user_id: &UserId) -> Result<RoomStatus> {
    Ok(RoomStatus {
        latest: store.latest_synced_event(room_id).await?,
        fully_read: store.read_marker(room_id).await?,
        read_receipt: store
            .read_receipt(room_id, user_id)
            .await?
            .map(|receipt| receipt.event_id),
        summary: store.room_summary(room_id).await?,
    })
}

fn print(room_id: &RoomId, user_id: &UserId, status: &RoomStatus) {
    println!("=== readmark status ===");
    println!();
    println!("Room: {}", room_id);
    println!("User: {}", user_id);
    println!();
    println!("  Latest event: {}", display(&status.latest));
    println!("  Fully read:   {}", display(&status.fully_read));
    println!("  Receipt:      {}", display(&status.read_receipt));

    match &status.summary {
        Some(summary) => {
            println!();
            println!("Summary:");
            println!("  Notifications: {}", summary.unread_notification_count);
            println!("  Highlights:    {}", summary.unread_highlight_count);
            println!(
                "  Unread:        {}",
                if summary.has_unread_messages { "yes" } else { "no" }
            );
        }
        None => {
            println!();
            println!("Summary: NONE");
        }
    }
}

fn display(event_id: &Option<EventId>) -> String {
    event_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}
