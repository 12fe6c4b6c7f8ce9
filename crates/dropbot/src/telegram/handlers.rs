//! Dispatcher schema and handler dependencies

use std::sync::Arc;

use dropcore::core::messages;
use dropcore::{Relay, RelayOutcome, Request};
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub relay: Arc<Relay>,
}

impl HandlerDeps {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }
}

/// Creates the dispatcher schema.
///
/// Commands are matched first; any other text message goes to the relay.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler())
        .branch(message_handler(deps))
}

fn command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(|bot: Bot, msg: Message, cmd: Command| async move {
            log::info!("Command {:?} from chat {}", cmd, msg.chat.id);
            bot.send_message(msg.chat.id, command_reply(&cmd)).await?;
            Ok(())
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| msg.text().map(str::to_owned))
        .endpoint(move |msg: Message, text: String| {
            let deps = deps.clone();
            async move {
                if is_unknown_command(&text) {
                    log::debug!("Ignoring unknown command in chat {}", msg.chat.id);
                    return Ok(());
                }

                let outcome = deps.relay.handle(Request::new(msg.chat.id.0, text)).await;
                if let RelayOutcome::Failed { kind } = outcome {
                    log::warn!("Chat {}: request ended with {}", msg.chat.id, kind);
                }
                Ok(())
            }
        })
}

fn command_reply(cmd: &Command) -> &'static str {
    match cmd {
        Command::Start => messages::START,
        Command::Help => messages::HELP,
    }
}

fn is_unknown_command(text: &str) -> bool {
    text.starts_with('/')
}
