//! Request handling from inbound text to delivered video.
//!
//! [`Relay::handle`] is the whole lifecycle of one message:
//!
//! 1. find a YouTube link, or reply with a hint and stop
//! 2. post a "Downloading..." status message
//! 3. run the fetch in the background inside a fresh [`JobDir`], editing the
//!    status message on every waiter tick
//! 4. size-check the artifact
//! 5. upload it through [`ChatApi::send_video`]
//! 6. delete the status message, or turn it into the failure text
//!
//! The job directory is dropped at the end of step 5 whatever happened, so
//! no file outlives its request.
//!
//! The chat platform sits behind [`ChatApi`]; the Telegram implementation
//! lives in the bot crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::core::config::Config;
use crate::core::error::{AppError, AppResult};
use crate::core::messages;
use crate::core::validation::extract_youtube_url;
use crate::download::{spawn_fetch, AvailabilityWaiter, FetchRequest, Fetcher, JobDir, SizeGate, WaitObserver};

/// Id of a message the bot sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// What the relay needs from a chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<MessageRef>;

    async fn edit_text(&self, chat_id: i64, message: MessageRef, text: &str) -> anyhow::Result<()>;

    async fn delete_message(&self, chat_id: i64, message: MessageRef) -> anyhow::Result<()>;

    /// Uploads the file at `path` as a streamable video.
    async fn send_video(&self, chat_id: i64, path: &Path) -> anyhow::Result<()>;
}

/// One inbound message
#[derive(Debug, Clone)]
pub struct Request {
    pub chat_id: i64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// No usable link; nothing was fetched
    Rejected,
    Delivered { bytes: u64 },
    /// Carries [`AppError::kind`]
    Failed { kind: &'static str },
}

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub download_dir: PathBuf,
    pub max_file_size: u64,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl RelayOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            max_file_size: config.max_file_size,
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

pub struct Relay {
    chat: Arc<dyn ChatApi>,
    fetcher: Arc<dyn Fetcher>,
    download_dir: PathBuf,
    waiter: AvailabilityWaiter,
    gate: SizeGate,
}

impl Relay {
    pub fn new(chat: Arc<dyn ChatApi>, fetcher: Arc<dyn Fetcher>, options: RelayOptions) -> Self {
        Self {
            chat,
            fetcher,
            download_dir: options.download_dir,
            waiter: AvailabilityWaiter::new(options.wait_timeout, options.poll_interval),
            gate: SizeGate::new(options.max_file_size),
        }
    }

    /// Handles one message end to end. Never fails: errors are logged and
    /// reported to the chat, and the outcome is returned for the caller's logs.
    pub async fn handle(&self, request: Request) -> RelayOutcome {
        let span = tracing::info_span!("relay", chat_id = request.chat_id);
        self.handle_inner(request).instrument(span).await
    }

    async fn handle_inner(&self, request: Request) -> RelayOutcome {
        let chat_id = request.chat_id;

        let Some(url) = extract_youtube_url(&request.text) else {
            log::info!("No YouTube link in message");
            self.reply(chat_id, messages::INVALID_LINK).await;
            return RelayOutcome::Rejected;
        };

        log::info!("Relaying {}", url);
        let status = self.reply(chat_id, messages::DOWNLOADING).await;

        match self.fetch_and_deliver(chat_id, url, status).await {
            Ok(bytes) => {
                if let Some(message) = status {
                    if let Err(e) = self.chat.delete_message(chat_id, message).await {
                        log::debug!("Could not delete status message: {:#}", e);
                    }
                }
                let took = Utc::now().signed_duration_since(request.received_at);
                log::info!("Delivered {} bytes in {}ms", bytes, took.num_milliseconds());
                RelayOutcome::Delivered { bytes }
            }
            Err(e) => {
                log::error!("Request failed [{}]: {}", e.kind(), e);
                self.report_failure(chat_id, status, &e.user_message()).await;
                RelayOutcome::Failed { kind: e.kind() }
            }
        }
    }

    async fn fetch_and_deliver(&self, chat_id: i64, url: String, status: Option<MessageRef>) -> AppResult<u64> {
        let job = JobDir::create(&self.download_dir, chat_id).await?;
        let request = FetchRequest {
            url,
            output_path: job.output_path(),
        };

        let handle = spawn_fetch(Arc::clone(&self.fetcher), request);
        let ticker = StatusTicker {
            chat: self.chat.as_ref(),
            chat_id,
            status,
        };
        let artifact = self.waiter.wait(handle, &ticker).await?;
        let artifact = self.gate.check(artifact).await?;

        let bytes = artifact.size();
        log::info!("Uploading {} ({} bytes)", artifact.path().display(), bytes);
        self.chat
            .send_video(chat_id, artifact.path())
            .await
            .map_err(AppError::DeliveryFailed)?;

        Ok(bytes)
    }

    /// Sends a text; failures are logged only.
    async fn reply(&self, chat_id: i64, text: &str) -> Option<MessageRef> {
        match self.chat.send_text(chat_id, text).await {
            Ok(message) => Some(message),
            Err(e) => {
                log::warn!("Failed to send message: {:#}", e);
                None
            }
        }
    }

    async fn report_failure(&self, chat_id: i64, status: Option<MessageRef>, text: &str) {
        if let Some(message) = status {
            match self.chat.edit_text(chat_id, message, text).await {
                Ok(()) => return,
                Err(e) => log::debug!("Could not edit status message, sending instead: {:#}", e),
            }
        }
        self.reply(chat_id, text).await;
    }
}

/// Edits the status message with the elapsed time on every waiter tick.
struct StatusTicker<'a> {
    chat: &'a dyn ChatApi,
    chat_id: i64,
    status: Option<MessageRef>,
}

#[async_trait]
impl WaitObserver for StatusTicker<'_> {
    async fn on_tick(&self, elapsed: Duration) {
        let Some(message) = self.status else {
            return;
        };
        if let Err(e) = self
            .chat
            .edit_text(self.chat_id, message, &messages::downloading_for(elapsed))
            .await
        {
            log::debug!("Status update failed: {:#}", e);
        }
    }
}
