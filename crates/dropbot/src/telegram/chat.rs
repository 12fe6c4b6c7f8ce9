use std::path::Path;

use async_trait::async_trait;
use dropcore::{ChatApi, MessageRef};
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};

/// [`ChatApi`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<MessageRef> {
        let message = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit_text(&self, chat_id: i64, message: MessageRef, text: &str) -> anyhow::Result<()> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message.0), text)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message: MessageRef) -> anyhow::Result<()> {
        self.bot.delete_message(ChatId(chat_id), MessageId(message.0)).await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path) -> anyhow::Result<()> {
        // The file is opened by the request and closed once the upload completes
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .supports_streaming(true)
            .await?;
        Ok(())
    }
}
