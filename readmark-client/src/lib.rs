//! # readmark-client
//!
//! Read-state reconciliation for a chat client.
//!
//! Moves a user's fully-read marker and read receipt in a room, keeps the
//! local copy consistent with the homeserver and clears the room's unread
//! counters once everything has been read.
//!
//! ## Features
//!
//! - **Monotonic pointers**: markers and receipts only ever move forward
//! - **Local-echo filtering**: events that are still being sent are never
//!   used as targets
//! - **Atomic local write**: marker, receipt, handlers and summary reset
//!   commit together or not at all
//! - **Detached remote notification**: the homeserver is told after commit,
//!   with retries, and its failures never undo local state
//! - **Pure resolution**: uses readmark-core for side-effect-free decisions
//!
//! ## Example
//!
//! ```ignore
//! use readmark_client::{Config, HttpReadMarkersApi, ReadMarkerService, SqliteStore};
//!
//! let config = Config::from_file("readmark.toml".as_ref())?;
//! let store = SqliteStore::new(&config.storage.database).await?;
//! let api = HttpReadMarkersApi::new(&config.homeserver.base_url, &config.homeserver.access_token, timeout)?;
//! let service = ReadMarkerService::new(store, user_id, api, &config.notify);
//!
//! service.mark_room_read(room_id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod service;
pub mod store;

pub use api::{ApiError, HttpReadMarkersApi, MockReadMarkersApi, ReadMarkersApi};
pub use config::{Config, ConfigError, HomeserverConfig, NotifyConfig, StorageConfig};
pub use error::{ClientError, NotifyError, Result, StoreError, StoreResult};
pub use notifier::{RemoteNotification, RemoteNotifier};
pub use service::{MarkerOutcome, ReadMarkerService};
pub use store::{
    ApplyOutcome, ContentHandler, Handlers, NoopHandler, RoomReadState, RoomSummary, SqliteStore,
};
