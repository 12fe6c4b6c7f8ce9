//! tubedrop - Telegram front end for the dropcore relay
//!
//! - `cli`: command line
//! - `telegram`: bot construction, dispatcher schema, `ChatApi` over teloxide
//! - `keepalive`: liveness endpoint for hosting platforms

pub mod cli;
pub mod keepalive;
pub mod telegram;
