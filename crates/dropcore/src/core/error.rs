use std::time::Duration;

use thiserror::Error;

use crate::core::messages;

/// Centralized error type for the download-and-relay path
///
/// Every failure is caught at the request boundary (see `relay`), logged with
/// full detail for operators and turned into one of a few generic texts via
/// [`AppError::user_message`]. None of these errors stop the bot.
#[derive(Error, Debug)]
pub enum AppError {
    /// Message does not contain a supported link; nothing was fetched
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    /// Fetch engine or wait budget exceeded
    #[error("Fetch timed out after {}s", .0.as_secs())]
    FetchTimeout(Duration),

    /// Engine/API produced no usable file (including exhausted fallbacks)
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Artifact exceeds the configured cap
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// Chat platform rejected or failed the upload
    #[error("Delivery failed: {0:#}")]
    DeliveryFailed(anyhow::Error),

    /// Configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration was read but makes no sense
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Stable label for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidUrl(_) => "invalid_url",
            AppError::FetchTimeout(_) => "fetch_timeout",
            AppError::FetchFailed(_) => "fetch_failed",
            AppError::FileTooLarge { .. } => "file_too_large",
            AppError::DeliveryFailed(_) => "delivery_failed",
            AppError::Config(_) | AppError::InvalidConfig(_) => "config",
            AppError::Io(_) => "io",
            AppError::Http(_) => "http",
            AppError::Url(_) => "url",
        }
    }

    /// Text shown to the chat; never carries internal detail.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidUrl(_) | AppError::Url(_) => messages::INVALID_LINK.to_string(),
            AppError::FileTooLarge { size, limit } => messages::too_large(*size, *limit),
            AppError::DeliveryFailed(_) => messages::UPLOAD_FAILED.to_string(),
            _ => messages::PROCESSING_FAILED.to_string(),
        }
    }
}
