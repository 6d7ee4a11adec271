//! Record timeline events locally.

use anyhow::{bail, Result};
use clap::Args;
use readmark_client::Config;
use readmark_types::EventId;

use super::{open_store, parse_event, parse_room};

/// Arguments of `readmark append`.
#[derive(Args, Debug)]
pub struct AppendArgs {
    /// Room the event belongs to
    #[arg(long)]
    pub room: String,

    /// Event id (generated as a local echo when omitted with --sending)
    #[arg(long)]
    pub event: Option<String>,

    /// Record the event as still being sent
    #[arg(long)]
    pub sending: bool,
}

/// Arguments of `readmark confirm`.
#[derive(Args, Debug)]
pub struct ConfirmArgs {
    /// Room the event belongs to
    #[arg(long)]
    pub room: String,

    /// Local echo id the event was recorded under
    #[arg(long)]
    pub local: String,

    /// Id assigned by the homeserver
    #[arg(long)]
    pub event: String,
}

/// Run the append command.
pub async fn run(config: &Config, args: &AppendArgs) -> Result<EventId> {
    let room_id = parse_room(&args.room)?;
    let event_id = match (&args.event, args.sending) {
        (Some(event), _) => parse_event(event)?,
        (None, true) => EventId::local_echo(),
        (None, false) => bail!("Must specify --event for a synced event"),
    };

    let store = open_store(config).await?;
    let ordering = store.append_event(&room_id, &event_id, args.sending).await?;

    if args.sending {
        println!("Appended {} to {} (sending)", event_id, room_id);
    } else {
        println!("Appended {} to {} at {}", event_id, room_id, ordering);
    }
    Ok(event_id)
}

/// Run the confirm command.
pub async fn confirm(config: &Config, args: &ConfirmArgs) -> Result<()> {
    let room_id = parse_room(&args.room)?;
    let local_id = parse_event(&args.local)?;
    let server_id = parse_event(&args.event)?;

    let store = open_store(config).await?;
    match store.confirm_sent(&room_id, &local_id, &server_id).await? {
        Some(ordering) => {
            println!("Confirmed {} as {} at {}", local_id, server_id, ordering);
            Ok(())
        }
        None => bail!("No pending event {} in {}", local_id, room_id),
    }
}
