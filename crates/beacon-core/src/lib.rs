// Core relay abstractions
//
// This crate defines the pieces every other Beacon crate agrees on:
// - PushEvent: the wire unit flowing from a sender worker to a browser
// - key derivation for markers, inboxes and daily counters
// - MarkerPayload: the consolidated "a consumer wants events" record
// - RelayStore: the store facade trait (Redis in production, memory in tests)
//
// Note: this crate has NO I/O - store implementations live in beacon-store.

pub mod config;
pub mod error;
pub mod event;
pub mod keys;
pub mod session;
pub mod traits;

pub use config::StreamConfig;
pub use error::{BeaconError, Result};
pub use event::PushEvent;
pub use session::MarkerPayload;
pub use traits::RelayStore;
