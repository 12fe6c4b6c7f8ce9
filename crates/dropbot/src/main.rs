use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;

use dropcore::config::FetchBackend;
use dropcore::core::validation::extract_youtube_url;
use dropcore::core::{init_logger, log_startup_configuration};
use dropcore::download::artifact::purge_stale_jobs;
use dropcore::download::{
    build_fetcher, spawn_fetch, AvailabilityWaiter, FetchRequest, JobDir, SizeGate, WaitObserver, YtDlpFetcher,
};
use dropcore::{Config, Relay, RelayOptions};
use tubedrop::cli::{Cli, Commands};
use tubedrop::keepalive::start_keepalive_server;
use tubedrop::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramChat};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments, loads configuration and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if start-up fails (config, logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from handler tasks; the dispatcher keeps running
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    let config = Config::load(cli.config.as_deref())?;
    init_logger(config.log_file_path.as_deref())?;
    log_startup_configuration(&config);

    match cli.command {
        Some(Commands::Run) => run_bot(config).await,
        Some(Commands::Download { url, output }) => run_cli_download(config, url, output).await,
        Some(Commands::Check) => run_check(&config).await,
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(config).await
        }
    }
}

async fn run_bot(config: Config) -> Result<()> {
    let bot = create_bot(&config)?;

    let purged = purge_stale_jobs(&config.download_dir).await?;
    log::debug!("Stale job dirs removed at start-up: {}", purged);

    if config.fetch.backend == FetchBackend::YtDlp {
        match YtDlpFetcher::from_config(&config).probe_version().await {
            Ok(version) => log::info!("yt-dlp version: {}", version),
            Err(e) => log::warn!("yt-dlp is not usable yet: {}", e),
        }
    }
    let fetcher = build_fetcher(&config)?;

    if config.keepalive.enabled {
        let port = config.keepalive.port;
        tokio::spawn(async move {
            if let Err(e) = start_keepalive_server(port).await {
                log::error!("Keep-alive server stopped: {}", e);
            }
        });
    }

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let chat = Arc::new(TelegramChat::new(bot.clone()));
    let relay = Arc::new(Relay::new(chat, fetcher, RelayOptions::from_config(&config)));
    let deps = HandlerDeps::new(relay);

    log::info!("Starting dispatcher");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher stopped");
    Ok(())
}

/// Prints progress of an offline download
struct ConsoleProgress;

#[async_trait]
impl WaitObserver for ConsoleProgress {
    async fn on_tick(&self, elapsed: Duration) {
        log::info!("still downloading ({}s)", elapsed.as_secs());
    }
}

/// Run CLI download command
async fn run_cli_download(config: Config, url: String, output: Option<PathBuf>) -> Result<()> {
    let url = extract_youtube_url(&url).ok_or_else(|| anyhow::anyhow!("Not a YouTube link: {}", url))?;
    let output_dir = output.unwrap_or_else(|| PathBuf::from("."));

    println!("URL:    {}", url);
    println!("Output: {}", output_dir.display());

    let fetcher = build_fetcher(&config)?;
    let job = JobDir::create(&config.download_dir, 0).await?;
    let request = FetchRequest {
        url,
        output_path: job.output_path(),
    };

    let artifact = AvailabilityWaiter::from_config(&config)
        .wait(spawn_fetch(fetcher, request), &ConsoleProgress)
        .await?;
    let artifact = SizeGate::new(config.max_file_size).check(artifact).await?;
    let size = artifact.size();

    let saved = job.keep(artifact, &output_dir).await?;
    println!("Saved {} ({} bytes)", saved.display(), size);
    Ok(())
}

/// Validates configuration and probes the selected backend
async fn run_check(config: &Config) -> Result<()> {
    match config.fetch.backend {
        FetchBackend::YtDlp => {
            let version = YtDlpFetcher::from_config(config).probe_version().await?;
            println!("yt-dlp:    {} ({})", version, config.ytdlp.bin);
        }
        FetchBackend::Cobalt => {
            for (index, url) in config.cobalt.instance_urls()?.iter().enumerate() {
                println!("cobalt #{}: {}", index + 1, url);
            }
        }
    }

    println!(
        "bot token: {}",
        if config.bot_token.is_some() { "set" } else { "missing" }
    );
    println!("Configuration OK");
    Ok(())
}
