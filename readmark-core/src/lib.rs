//! # readmark-core
//!
//! Pure logic for readmark (no I/O, instant tests).
//!
//! This crate decides whether a room's fully-read marker and read receipt
//! should move, without any database or network access.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about the monotonicity rules
//!
//! The actual I/O (local store, homeserver) is performed by `readmark-client`,
//! which interprets the [`MarkerPlan`] produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod echo;
pub mod guard;
pub mod resolver;

pub use backoff::Backoff;
pub use echo::{is_local_echo, reject_local_echo};
pub use guard::{is_already_read, is_more_recent_than_stored, StoredPointer};
pub use resolver::{effective_targets, plan, MarkerPlan, MarkerRequest, ReadStateSnapshot};
