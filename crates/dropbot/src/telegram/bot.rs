//! Bot instance creation and command list

use std::time::Duration;

use dropcore::Config;
use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// Uploads of files near the size cap can take minutes on slow links
const HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "what this bot does")]
    Start,
    #[command(description = "how to use it")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Token missing, invalid API URL or HTTP client failure
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let token = config.require_bot_token()?;
    let client = ClientBuilder::new().timeout(HTTP_TIMEOUT).build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    match config.bot_api_url {
        Some(ref raw) => {
            let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid bot_api_url: {}", e))?;
            log::info!("Using custom Bot API URL: {}", url);
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Publishes the command list shown in Telegram's menu
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
