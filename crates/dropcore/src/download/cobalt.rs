//! Remote conversion API backend (cobalt-style instances).
//!
//! One `CobaltInstance` talks to one server: it asks the API for a media
//! link, then streams that link to the job's output path. Several instances
//! are chained by [`FallbackChain`](crate::download::FallbackChain).
//!
//! Two request shapes are spoken. Current servers take `POST /` with
//! `videoQuality`/`youtubeVideoCodec`; older ones answer `404` there and take
//! `POST /api/json` with `vQuality`/`vCodec` instead.
//!
//! `request_timeout` bounds connecting, the API call, and every read of the
//! media stream. The media transfer as a whole is only bounded by the
//! chain's deadline, so a slow but steady tunnel is not cut off.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::core::config::{CobaltConfig, Config};
use crate::core::error::{AppError, AppResult};
use crate::download::{verify_artifact, FetchRequest, Fetcher, LocalArtifact};

/// Request knobs sent with every API call
#[derive(Debug, Clone)]
pub struct CobaltOptions {
    pub video_quality: String,
    pub video_codec: String,
    pub filename_style: String,
}

impl From<&CobaltConfig> for CobaltOptions {
    fn from(config: &CobaltConfig) -> Self {
        Self {
            video_quality: config.video_quality.clone(),
            video_codec: config.video_codec.clone(),
            filename_style: config.filename_style.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiShape {
    Current,
    Legacy,
}

impl ApiShape {
    fn endpoint(self, base: &Url) -> AppResult<Url> {
        Ok(match self {
            ApiShape::Current => base.clone(),
            ApiShape::Legacy => base.join("api/json")?,
        })
    }

    fn body(self, url: &str, options: &CobaltOptions) -> Value {
        match self {
            ApiShape::Current => json!({
                "url": url,
                "videoQuality": options.video_quality,
                "youtubeVideoCodec": options.video_codec,
                "filenameStyle": options.filename_style,
            }),
            ApiShape::Legacy => json!({
                "url": url,
                "vQuality": options.video_quality,
                "vCodec": options.video_codec,
                "filenamePattern": options.filename_style,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    status: Option<String>,
    url: Option<String>,
    picker: Vec<PickerItem>,
    /// Legacy servers explain errors here
    text: Option<String>,
    /// Current servers put `{ "code": ... }` here
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PickerItem {
    url: Option<String>,
}

impl ApiResponse {
    /// Direct link, or the first picker entry
    fn media_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.picker.iter().find_map(|item| item.url.as_deref()))
            .filter(|url| !url.trim().is_empty())
    }

    fn error_detail(&self) -> String {
        if let Some(code) = self.error.as_ref().and_then(|e| e.get("code")).and_then(Value::as_str) {
            return code.to_string();
        }
        self.text.clone().unwrap_or_else(|| "no detail".to_string())
    }
}

/// A single API server.
pub struct CobaltInstance {
    name: String,
    base: Url,
    client: reqwest::Client,
    options: CobaltOptions,
    request_timeout: Duration,
    /// Download aborted above this many bytes
    size_limit: u64,
}

impl CobaltInstance {
    pub fn new(mut base: Url, options: CobaltOptions, request_timeout: Duration) -> AppResult<Self> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .read_timeout(request_timeout)
            .user_agent(concat!("tubedrop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let name = format!("cobalt@{}", base.host_str().unwrap_or("instance"));
        Ok(Self {
            name,
            base,
            client,
            options,
            request_timeout,
            size_limit: u64::MAX,
        })
    }

    /// Aborts downloads that grow past `limit` bytes.
    pub fn with_size_limit(mut self, limit: u64) -> Self {
        self.size_limit = limit;
        self
    }

    /// One instance per configured URL, in priority order.
    pub fn all_from_config(config: &Config) -> AppResult<Vec<Self>> {
        let options = CobaltOptions::from(&config.cobalt);
        config
            .cobalt
            .instance_urls()?
            .into_iter()
            .map(|url| {
                Self::new(url, options.clone(), config.cobalt.request_timeout())
                    .map(|instance| instance.with_size_limit(config.max_file_size))
            })
            .collect()
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Asks the API for a downloadable link, falling back to the legacy shape on 404.
    async fn resolve(&self, source_url: &str) -> AppResult<Url> {
        let response = match self.call(ApiShape::Current, source_url).await? {
            Some(response) => response,
            None => {
                log::debug!("{}: current API not found, trying legacy /api/json", self.name);
                self.call(ApiShape::Legacy, source_url).await?.ok_or_else(|| {
                    AppError::FetchFailed(format!("{}: legacy API returned 404", self.name))
                })?
            }
        };

        if response.status.as_deref() == Some("error") {
            return Err(AppError::FetchFailed(format!(
                "{}: API error: {}",
                self.name,
                response.error_detail()
            )));
        }

        let media_url = response
            .media_url()
            .ok_or_else(|| AppError::FetchFailed(format!("{}: response has no media link", self.name)))?;
        self.base
            .join(media_url)
            .map_err(|e| AppError::FetchFailed(format!("{}: bad media link: {}", self.name, e)))
    }

    /// `Ok(None)` means the endpoint does not exist (404).
    async fn call(&self, shape: ApiShape, source_url: &str) -> AppResult<Option<ApiResponse>> {
        let endpoint = shape.endpoint(&self.base)?;
        let response = self
            .client
            .post(endpoint)
            .timeout(self.request_timeout)
            .header(ACCEPT, "application/json")
            .json(&shape.body(source_url, &self.options))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::FetchFailed(format!(
                "{}: API returned {}",
                self.name, status
            )));
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| AppError::FetchFailed(format!("{}: response is not valid JSON: {}", self.name, e)))
    }

    /// Streams `media_url` into `output`, removing the partial file on error.
    async fn download(&self, media_url: Url, output: &Path) -> AppResult<u64> {
        let result = self.stream_to_file(media_url, output).await;
        if result.is_err() {
            let _ = fs_err::tokio::remove_file(output).await;
        }
        result
    }

    async fn stream_to_file(&self, media_url: Url, output: &Path) -> AppResult<u64> {
        let response = self.client.get(media_url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::FetchFailed(format!(
                "{}: media download returned {}",
                self.name,
                response.status()
            )));
        }

        if let Some(size) = response.content_length().filter(|size| *size > self.size_limit) {
            return Err(AppError::FileTooLarge {
                size,
                limit: self.size_limit,
            });
        }

        let mut file = fs_err::tokio::File::create(output).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.size_limit {
                log::warn!("{}: download passed {} bytes, aborting", self.name, self.size_limit);
                return Err(AppError::FileTooLarge {
                    size: written,
                    limit: self.size_limit,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl Fetcher for CobaltInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
        let media_url = self.resolve(&request.url).await?;
        log::debug!("{}: media link resolved", self.name);

        let written = self.download(media_url, &request.output_path).await?;
        log::info!("{}: downloaded {} bytes", self.name, written);

        verify_artifact(&request.output_path).await
    }
}
