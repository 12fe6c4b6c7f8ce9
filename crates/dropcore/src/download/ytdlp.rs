//! `yt-dlp` subprocess backend.
//!
//! The engine is told the exact output path (`-o <job>/video.mp4`) and to
//! merge into mp4, so success is confirmed by looking at that one path
//! instead of scanning the directory for whatever the engine named the file.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::config::Config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::run_with_timeout;
use crate::download::{verify_artifact, FetchRequest, Fetcher, LocalArtifact};

/// Deadline for `yt-dlp --version`
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct YtDlpFetcher {
    bin: PathBuf,
    format: String,
    socket_timeout_secs: u64,
    retries: u32,
    /// Passed as `--max-filesize`
    max_filesize: Option<u64>,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        let defaults = crate::core::config::YtDlpConfig::default();
        Self {
            bin: bin.into(),
            format: defaults.format,
            socket_timeout_secs: defaults.socket_timeout_secs,
            retries: defaults.retries,
            max_filesize: None,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bin: PathBuf::from(&config.ytdlp.bin),
            format: config.ytdlp.format.clone(),
            socket_timeout_secs: config.ytdlp.socket_timeout_secs,
            retries: config.ytdlp.retries,
            max_filesize: Some(config.max_file_size),
            timeout: config.fetch_timeout(),
        }
    }

    /// Arguments for one download; the URL always goes last.
    pub fn build_args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            self.format.clone(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            self.retries.to_string(),
            "--fragment-retries".to_string(),
            self.retries.to_string(),
            "--no-progress".to_string(),
            "--quiet".to_string(),
        ];
        if let Some(limit) = self.max_filesize {
            args.push("--max-filesize".to_string());
            args.push(limit.to_string());
        }
        args.push("-o".to_string());
        args.push(request.output_path.to_string_lossy().into_owned());
        args.push(request.url.clone());
        args
    }

    /// Runs `yt-dlp --version`, used as a start-up sanity check.
    pub async fn probe_version(&self) -> AppResult<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--version").kill_on_drop(true);

        let output = tokio::time::timeout(PROBE_TIMEOUT, cmd.output())
            .await
            .map_err(|_| AppError::FetchTimeout(PROBE_TIMEOUT))??;

        if !output.status.success() {
            return Err(AppError::FetchFailed(format!(
                "{} --version exited with {}",
                self.bin.display(),
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
        let args = self.build_args(request);
        log::info!("yt-dlp: fetching {} -> {}", request.url, request.output_path.display());
        log::debug!("yt-dlp args: {:?}", args);

        let mut cmd = Command::new(&self.bin);
        cmd.args(&args);

        let output = run_with_timeout(cmd, self.timeout).await?;
        if !output.status.success() {
            log::error!("yt-dlp failed ({}): {}", output.status, output.stderr_tail);
            return Err(AppError::FetchFailed(format!(
                "yt-dlp exited with {}: {}",
                output.status, output.stderr_tail
            )));
        }
        if !output.stderr_tail.is_empty() {
            log::debug!("yt-dlp stderr: {}", output.stderr_tail);
        }

        verify_artifact(&request.output_path).await
    }
}
