//! Move the read pointers of a room.

use anyhow::{bail, Context, Result};
use clap::Args;
use readmark_client::{
    Config, HttpReadMarkersApi, MarkerOutcome, MockReadMarkersApi, ReadMarkerService,
    ReadMarkersApi,
};
use readmark_core::MarkerRequest;
use std::time::Duration;

use super::{open_store, parse_event, parse_room};
use crate::config::user_id;

/// Arguments of `readmark mark-read`.
#[derive(Args, Debug, Default)]
pub struct MarkReadArgs {
    /// Room whose pointers move
    #[arg(long)]
    pub room: String,

    /// Move the fully-read marker to this event
    #[arg(long)]
    pub fully_read: Option<String>,

    /// Move the read receipt to this event
    #[arg(long)]
    pub receipt: Option<String>,

    /// Move the fully-read marker to the latest synced event
    #[arg(long)]
    pub force_marker: bool,

    /// Move the read receipt to the latest synced event
    #[arg(long)]
    pub force_receipt: bool,

    /// Do not contact the homeserver
    #[arg(long)]
    pub offline: bool,
}

impl MarkReadArgs {
    /// Build the request described by the arguments.
    pub fn to_request(&self) -> Result<MarkerRequest> {
        let mut request = MarkerRequest::new(parse_room(&self.room)?);
        if let Some(event) = &self.fully_read {
            request = request.fully_read(parse_event(event)?);
        }
        if let Some(event) = &self.receipt {
            request = request.read_receipt(parse_event(event)?);
        }
        if self.force_marker {
            request = request.force_read_marker();
        }
        if self.force_receipt {
            request = request.force_read_receipt();
        }
        Ok(request)
    }
}

/// Run the mark-read command.
pub async fn run(config: &Config, args: &MarkReadArgs) -> Result<()> {
    let request = args.to_request()?;
    let store = open_store(config).await?;
    let user_id = user_id(config)?;

    if args.offline {
        let service =
            ReadMarkerService::new(store, user_id, MockReadMarkersApi::new(), &config.notify);
        apply(&service, request, false).await
    } else {
        let api = HttpReadMarkersApi::new(
            &config.homeserver.base_url,
            &config.homeserver.access_token,
            Duration::from_secs(config.homeserver.request_timeout_secs),
        )
        .context("Failed to create homeserver client")?;
        let service = ReadMarkerService::new(store, user_id, api, &config.notify);
        apply(&service, request, true).await
    }
}

async fn apply<A: ReadMarkersApi + 'static>(
    service: &ReadMarkerService<A>,
    request: MarkerRequest,
    online: bool,
) -> Result<()> {
    let outcome = service.set_read_markers(request).await?;

    if is_up_to_date(&outcome) {
        println!("Already up to date");
        return Ok(());
    }
    print_outcome(&outcome);

    // The runtime shuts down on return, so wait for the homeserver here.
    if let Err(e) = outcome.remote_result().await {
        bail!("Saved locally, homeserver not notified: {}", e);
    }
    if online {
        println!("Homeserver notified");
    }
    Ok(())
}

fn is_up_to_date(outcome: &MarkerOutcome) -> bool {
    !outcome.changed() && !outcome.summary_reset
}

fn print_outcome(outcome: &MarkerOutcome) {
    if let Some(event_id) = &outcome.written.fully_read {
        println!("Fully read: {}", event_id);
    }
    if let Some(event_id) = &outcome.written.read_receipt {
        println!("Receipt:    {}", event_id);
    }
    if outcome.summary_reset {
        println!("Room marked as read");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::temp_config;
    use readmark_client::RoomSummary;
    use readmark_types::{EventId, MarkerTargets, RoomId};

    fn room() -> RoomId {
        RoomId::new("!room:example.org").unwrap()
    }

    fn offline(room: &str) -> MarkReadArgs {
        MarkReadArgs {
            room: room.to_string(),
            offline: true,
            ..Default::default()
        }
    }

    #[test]
    fn request_from_args() {
        let args = MarkReadArgs {
            fully_read: Some("$e1".to_string()),
            force_receipt: true,
            ..offline("!room:example.org")
        };

        let request = args.to_request().unwrap();
        assert_eq!(request.room_id, room());
        assert_eq!(request.fully_read_event_id, Some(EventId::new("$e1").unwrap()));
        assert!(request.force_read_receipt);
        assert!(!request.force_read_marker);
    }

    #[test]
    fn invalid_room_is_rejected() {
        assert!(offline("").to_request().is_err());
    }

    #[tokio::test]
    async fn offline_mark_read_updates_store() {
        let (config, _dir) = temp_config();
        let store = open_store(&config).await.unwrap();
        for id in ["$e1", "$e2"] {
            store
                .append_event(&room(), &EventId::new(id).unwrap(), false)
                .await
                .unwrap();
        }

        let args = MarkReadArgs {
            force_marker: true,
            force_receipt: true,
            ..offline("!room:example.org")
        };
        run(&config, &args).await.unwrap();

        assert_eq!(
            store.read_marker(&room()).await.unwrap(),
            Some(EventId::new("$e2").unwrap())
        );

        // Second run is a no-op.
        run(&config, &args).await.unwrap();
    }

    #[test]
    fn summary_reset_alone_is_a_change() {
        let outcome = MarkerOutcome {
            written: MarkerTargets::none(),
            summary_reset: true,
            remote: None,
        };
        assert!(!is_up_to_date(&outcome));

        let outcome = MarkerOutcome {
            summary_reset: false,
            ..outcome
        };
        assert!(is_up_to_date(&outcome));
    }

    #[tokio::test]
    async fn summary_only_reset_clears_counters() {
        let (config, _dir) = temp_config();
        let store = open_store(&config).await.unwrap();
        store
            .append_event(&room(), &EventId::new("$e1").unwrap(), false)
            .await
            .unwrap();

        let args = MarkReadArgs {
            force_receipt: true,
            ..offline("!room:example.org")
        };
        run(&config, &args).await.unwrap();

        // Sync raises the counters again without a newer event.
        let unread = RoomSummary {
            unread_notification_count: 2,
            unread_highlight_count: 0,
            has_unread_messages: true,
        };
        store.upsert_room_summary(&room(), unread).await.unwrap();

        run(&config, &args).await.unwrap();

        assert!(store.room_summary(&room()).await.unwrap().unwrap().is_read());
    }

    #[tokio::test]
    async fn unknown_homeserver_url_fails_before_writing() {
        let (mut config, _dir) = temp_config();
        config.homeserver.base_url = "not a url".to_string();

        let args = MarkReadArgs {
            room: "!room:example.org".to_string(),
            force_marker: true,
            ..Default::default()
        };
        assert!(run(&config, &args).await.is_err());
    }
}
