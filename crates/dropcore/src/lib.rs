//! dropcore - download-and-relay engine behind the tubedrop Telegram bot
//!
//! This library holds everything that does not need Telegram itself:
//! configuration, errors, logging, URL validation, the fetch backends,
//! the availability waiter, the size gate, per-request cleanup and the
//! relay flow that ties them together over the [`relay::ChatApi`] seam.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process helpers, validation
//! - `download`: fetch backends, waiter, size gate, job directories
//! - `relay`: request handling from inbound text to delivered video

pub mod core;
pub mod download;
pub mod relay;

// Re-export commonly used types for convenience
pub use core::config::{self, Config};
pub use core::error::{AppError, AppResult};
pub use relay::{ChatApi, MessageRef, Relay, RelayOptions, RelayOutcome, Request};
