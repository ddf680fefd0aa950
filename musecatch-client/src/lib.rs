//! # MuseCatch client core
//!
//! Client-side synchronization and playback for the MuseCatch download
//! service:
//! - `api`: HTTP client and the [`api::QueueBackend`] seam
//! - `sync`: progress stream, snapshot poller and the queue coordinator
//! - `playback`: the shared playback controller and its engine seam

pub mod api;
pub mod error;
pub mod playback;
pub mod sync;

pub use error::{Error, Result};
