//! Logging initialization and start-up diagnostics
//!
//! Code logs through the `log` facade; the subscriber below is a
//! `tracing-subscriber` registry that also receives `log` records, so spans
//! opened with `tracing` (one per relayed request) show up around them.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::{Config, FetchBackend};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info";

/// Initialize logger for console and, optionally, file output
///
/// # Arguments
/// * `log_file_path` - File to mirror log lines into (truncated on start)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Log file not writable or a logger is already set
pub fn init_logger(log_file_path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match log_file_path {
        Some(path) => {
            let file = fs_err::File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file.into_parts().0)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at start-up (token excluded)
pub fn log_startup_configuration(config: &Config) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("tubedrop configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("download dir:   {}", config.download_dir.display());
    log::info!("max file size:  {} bytes", config.max_file_size);
    log::info!(
        "wait budget:    {}s (tick every {}s)",
        config.wait_timeout_secs,
        config.poll_interval_secs
    );
    log::info!(
        "fetch backend:  {} (timeout {}s)",
        config.fetch.backend.as_str(),
        config.fetch.timeout_secs
    );

    match config.fetch.backend {
        FetchBackend::YtDlp => {
            log::info!("yt-dlp binary:  {}", config.ytdlp.bin);
            log::info!("yt-dlp format:  {}", config.ytdlp.format);
        }
        FetchBackend::Cobalt => {
            for (index, instance) in config.cobalt.instances.iter().enumerate() {
                log::info!("cobalt #{}:      {}", index + 1, instance);
            }
        }
    }

    if let Some(ref url) = config.bot_api_url {
        log::info!("Bot API URL:    {}", url);
    }
    if config.keepalive.enabled {
        log::info!("keep-alive:     0.0.0.0:{}", config.keepalive.port);
    }
    if config.bot_token.is_none() {
        log::warn!("BOT_TOKEN is not set - only offline commands will work");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_reports_unwritable_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("app.log");

        assert!(init_logger(Some(&missing)).is_err());
    }

    #[test]
    fn test_log_startup_configuration_runs() {
        // No subscriber is needed for the facade calls to be valid
        let mut config = Config::default();
        config.fetch.backend = FetchBackend::Cobalt;
        config.cobalt.instances = vec!["https://one.example".to_string()];
        log_startup_configuration(&config);
    }
}
