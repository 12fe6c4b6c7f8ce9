//! Shared fakes for the relay integration tests
//!
//! - `RecordingChat` records every chat call instead of talking to Telegram
//! - `ScriptedFetcher` writes a file of a chosen size, fails, or hangs

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dropcore::download::{verify_artifact, FetchRequest, Fetcher, LocalArtifact};
use dropcore::{AppError, AppResult, ChatApi, MessageRef, Relay, RelayOptions};

pub const MB: u64 = 1024 * 1024;

/// One call made against the fake chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Text { chat_id: i64, text: String },
    Edit { message: MessageRef, text: String },
    Delete { message: MessageRef },
    Video { chat_id: i64, path: PathBuf, size: u64 },
}

#[derive(Default)]
pub struct RecordingChat {
    events: Mutex<Vec<ChatEvent>>,
    next_id: AtomicI32,
    fail_uploads: bool,
}

impl RecordingChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Chat whose uploads always fail, e.g. rejected by the platform
    pub fn failing_uploads() -> Arc<Self> {
        Arc::new(Self {
            fail_uploads: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn videos(&self) -> Vec<(PathBuf, u64)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Video { path, size, .. } => Some((path, size)),
                _ => None,
            })
            .collect()
    }

    /// Text of the last edit, which is what the user ends up seeing
    pub fn last_edit(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            ChatEvent::Edit { text, .. } => Some(text),
            _ => None,
        })
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<MessageRef> {
        self.record(ChatEvent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn edit_text(&self, _chat_id: i64, message: MessageRef, text: &str) -> anyhow::Result<()> {
        self.record(ChatEvent::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, message: MessageRef) -> anyhow::Result<()> {
        self.record(ChatEvent::Delete { message });
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path) -> anyhow::Result<()> {
        let size = std::fs::metadata(path)?.len();
        self.record(ChatEvent::Video {
            chat_id,
            path: path.to_path_buf(),
            size,
        });
        if self.fail_uploads {
            anyhow::bail!("Request Entity Too Large");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Write a (sparse) file of this many bytes
    Produce(u64),
    Fail,
    /// Never finish
    Hang,
}

pub struct ScriptedFetcher {
    script: Script,
    calls: AtomicUsize,
    last_output: Mutex<Option<PathBuf>>,
}

impl ScriptedFetcher {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_output: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_output(&self) -> Option<PathBuf> {
        self.last_output.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_output.lock().unwrap() = Some(request.output_path.clone());

        match self.script {
            Script::Produce(len) => {
                let file = std::fs::File::create(&request.output_path)?;
                file.set_len(len)?;
                verify_artifact(&request.output_path).await
            }
            Script::Fail => Err(AppError::FetchFailed("engine exited with 1".into())),
            Script::Hang => {
                // Leave a partial file behind, like an interrupted engine
                std::fs::write(request.output_path.with_extension("mp4.part"), b"partial")?;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::FetchFailed("unreachable".into()))
            }
        }
    }
}

pub fn options(download_dir: &Path) -> RelayOptions {
    RelayOptions {
        download_dir: download_dir.to_path_buf(),
        max_file_size: 50 * MB,
        wait_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
    }
}

pub fn relay(chat: Arc<RecordingChat>, fetcher: Arc<dyn Fetcher>, options: RelayOptions) -> Relay {
    Relay::new(chat, fetcher, options)
}

/// Number of entries left in `dir`
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
