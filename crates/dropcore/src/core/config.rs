//! Bot configuration, built once at start-up and passed down explicitly.
//!
//! Sources, later ones winning:
//! 1. compiled-in defaults (see [`defaults`])
//! 2. optional TOML file (`tubedrop.toml` or the `--config` path)
//! 3. `TUBEDROP_*` environment variables, `__` separating nested keys
//!    (`TUBEDROP_FETCH__BACKEND=cobalt`)
//! 4. `TELOXIDE_TOKEN`, then `BOT_TOKEN` for the bot token
//!
//! A `.env` file in the working directory is loaded first if present.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::core::error::{AppError, AppResult};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "tubedrop.toml";

/// Prefix of the environment variables read into [`Config`]
pub const ENV_PREFIX: &str = "TUBEDROP_";

/// Default values for every tunable
pub mod defaults {
    /// Telegram Bot API allows up to 50MB for files sent by bots
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

    /// Overall budget for waiting on a background fetch
    pub const WAIT_TIMEOUT_SECS: u64 = 120;

    /// How often the waiter wakes up while a fetch is running
    pub const POLL_INTERVAL_SECS: u64 = 2;

    /// Hard limit for a single fetch (subprocess or API chain)
    pub const FETCH_TIMEOUT_SECS: u64 = 90;

    pub const DOWNLOAD_DIR: &str = "downloads";

    pub const YTDL_BIN: &str = "yt-dlp";

    /// Prefer a progressive mp4, merge separate tracks into mp4 otherwise.
    /// No bare `b` branch: a single webm stream would not be remuxed.
    pub const YTDL_FORMAT: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba";

    pub const YTDL_SOCKET_TIMEOUT_SECS: u64 = 20;

    pub const YTDL_RETRIES: u32 = 3;

    pub const COBALT_VIDEO_QUALITY: &str = "720";

    pub const COBALT_VIDEO_CODEC: &str = "h264";

    pub const COBALT_FILENAME_STYLE: &str = "basic";

    pub const COBALT_REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const KEEPALIVE_PORT: u16 = 8080;
}

/// Which external capability turns a link into a local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Local `yt-dlp` subprocess
    #[default]
    YtDlp,
    /// Remote cobalt-style conversion API instances
    Cobalt,
}

impl FetchBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchBackend::YtDlp => "ytdlp",
            FetchBackend::Cobalt => "cobalt",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub backend: FetchBackend,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: FetchBackend::default(),
            timeout_secs: defaults::FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Binary name or path
    pub bin: String,
    /// Value passed to `--format`
    pub format: String,
    pub socket_timeout_secs: u64,
    /// Used for both `--retries` and `--fragment-retries`
    pub retries: u32,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            bin: defaults::YTDL_BIN.to_string(),
            format: defaults::YTDL_FORMAT.to_string(),
            socket_timeout_secs: defaults::YTDL_SOCKET_TIMEOUT_SECS,
            retries: defaults::YTDL_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CobaltConfig {
    /// Instance base URLs in priority order
    #[serde(deserialize_with = "string_list")]
    pub instances: Vec<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub video_quality: String,
    pub video_codec: String,
    pub filename_style: String,
    pub request_timeout_secs: u64,
}

impl Default for CobaltConfig {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            video_quality: defaults::COBALT_VIDEO_QUALITY.to_string(),
            video_codec: defaults::COBALT_VIDEO_CODEC.to_string(),
            filename_style: defaults::COBALT_FILENAME_STYLE.to_string(),
            request_timeout_secs: defaults::COBALT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CobaltConfig {
    /// Parses the configured instances, keeping their order
    pub fn instance_urls(&self) -> AppResult<Vec<Url>> {
        self.instances
            .iter()
            .map(|raw| {
                let url = Url::parse(raw.trim())
                    .map_err(|e| AppError::InvalidConfig(format!("cobalt instance '{}': {}", raw, e)))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(AppError::InvalidConfig(format!(
                        "cobalt instance '{}' must use http or https",
                        raw
                    )));
                }
                Ok(url)
            })
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Liveness endpoint required by some hosting platforms
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: defaults::KEEPALIVE_PORT,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "secret_token")]
    pub bot_token: Option<SecretString>,
    /// Custom (e.g. local) Bot API server
    pub bot_api_url: Option<String>,
    pub download_dir: PathBuf,
    pub max_file_size: u64,
    pub wait_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub log_file_path: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub ytdlp: YtDlpConfig,
    pub cobalt: CobaltConfig,
    pub keepalive: KeepAliveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_api_url: None,
            download_dir: PathBuf::from(defaults::DOWNLOAD_DIR),
            max_file_size: defaults::MAX_FILE_SIZE_BYTES,
            wait_timeout_secs: defaults::WAIT_TIMEOUT_SECS,
            poll_interval_secs: defaults::POLL_INTERVAL_SECS,
            log_file_path: None,
            fetch: FetchConfig::default(),
            ytdlp: YtDlpConfig::default(),
            cobalt: CobaltConfig::default(),
            keepalive: KeepAliveConfig::default(),
        }
    }
}

impl Config {
    /// Loads `.env`, merges every source and validates the result.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env: {}", e);
            }
        }

        let config: Config = Self::figment(config_file).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Provider chain without the `.env` side effect.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["TELOXIDE_TOKEN"]).map(|_| "bot_token".into()))
            .merge(Env::raw().only(&["BOT_TOKEN"]))
    }

    /// Rejects values the bot cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_file_size == 0 {
            return Err(AppError::InvalidConfig("max_file_size must be positive".into()));
        }
        if self.wait_timeout_secs == 0 {
            return Err(AppError::InvalidConfig("wait_timeout_secs must be positive".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::InvalidConfig("poll_interval_secs must be positive".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::InvalidConfig("fetch.timeout_secs must be positive".into()));
        }
        if self.ytdlp.bin.trim().is_empty() {
            return Err(AppError::InvalidConfig("ytdlp.bin must not be empty".into()));
        }

        let instances = self.cobalt.instance_urls()?;
        if self.fetch.backend == FetchBackend::Cobalt && instances.is_empty() {
            return Err(AppError::InvalidConfig(
                "fetch.backend is cobalt but cobalt.instances is empty".into(),
            ));
        }

        if let Some(ref raw) = self.bot_api_url {
            Url::parse(raw).map_err(|e| AppError::InvalidConfig(format!("bot_api_url '{}': {}", raw, e)))?;
        }

        Ok(())
    }

    /// Returns the bot token or an error naming the variables to set.
    pub fn require_bot_token(&self) -> AppResult<&SecretString> {
        self.bot_token
            .as_ref()
            .ok_or_else(|| AppError::InvalidConfig("BOT_TOKEN (or TELOXIDE_TOKEN) is not set".into()))
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}

fn secret_token<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .map(SecretString::from))
}

/// Accepts a list or a comma-separated string (handy in env vars).
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    let items = match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(raw) => raw.split(',').map(str::to_string).collect(),
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Env values like `720` arrive as numbers; the API wants strings.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(u64),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Number(number) => number.to_string(),
    })
}
