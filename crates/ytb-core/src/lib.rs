//! Core of the YouTube → Telegram notifier.
//!
//! This crate is framework-agnostic: the feed endpoint, the `yt-dlp`
//! extractor and Telegram live behind ports (traits) implemented in adapter
//! crates. What lives here is the polling loop with its dedup state store,
//! plus the size-bounded delivery pipeline.

pub mod channel_ref;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod poller;
pub mod ports;
pub mod registry;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, ErrorKind, Result};
