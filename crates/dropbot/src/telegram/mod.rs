//! Telegram side of the bot

pub mod bot;
pub mod chat;
pub mod handlers;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use chat::TelegramChat;
pub use handlers::{schema, HandlerDeps, HandlerError};
