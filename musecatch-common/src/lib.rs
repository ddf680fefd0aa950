//! # MuseCatch Common Library
//!
//! Shared code for the MuseCatch client crates:
//! - Wire types for the backend REST API (`{code, message, data}` envelope)
//! - Notice types and the broadcast `EventBus`
//! - Configuration resolution
//! - Client-side server-push (SSE) frame decoding

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
