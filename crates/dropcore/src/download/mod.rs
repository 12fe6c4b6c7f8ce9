//! Fetch backends and the pieces that guard their output.
//!
//! A [`Fetcher`] turns a source URL into a [`LocalArtifact`] at an exact path
//! inside a per-request [`JobDir`]. Built-in backends:
//! - `YtDlpFetcher`: local `yt-dlp` subprocess with a hard timeout
//! - `FallbackChain` of `CobaltInstance`s: remote conversion API instances
//!   tried in priority order
//!
//! The backend is picked once from configuration by [`build_fetcher`].

pub mod artifact;
pub mod cobalt;
pub mod fallback;
pub mod size_gate;
pub mod waiter;
pub mod ytdlp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::{Config, FetchBackend};
use crate::core::error::{AppError, AppResult};

pub use artifact::{JobDir, LocalArtifact};
pub use cobalt::CobaltInstance;
pub use fallback::FallbackChain;
pub use size_gate::SizeGate;
pub use waiter::{spawn_fetch, AvailabilityWaiter, FetchHandle, WaitObserver};
pub use ytdlp::YtDlpFetcher;

/// Request parameters for a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Validated source URL
    pub url: String,
    /// Exact path the media file must end up at
    pub output_path: PathBuf,
}

/// Trait for fetch backends.
///
/// Implementations either leave a non-empty file at `request.output_path`
/// and return it, or fail. Callers never assume the path exists otherwise.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable name used in logs (e.g. "yt-dlp")
    fn name(&self) -> &str;

    /// Produce the media file for `request.url`.
    async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact>;
}

/// Confirms `path` holds a non-empty file and wraps it as an artifact.
pub async fn verify_artifact(path: &Path) -> AppResult<LocalArtifact> {
    match fs_err::tokio::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(LocalArtifact::new(path.to_path_buf(), meta.len())),
        Ok(_) => Err(AppError::FetchFailed(format!(
            "output {} is empty or not a file",
            path.display()
        ))),
        Err(_) => Err(AppError::FetchFailed(format!(
            "expected output {} was not produced",
            path.display()
        ))),
    }
}

/// Create the fetcher selected by `fetch.backend`.
pub fn build_fetcher(config: &Config) -> AppResult<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match config.fetch.backend {
        FetchBackend::YtDlp => Arc::new(YtDlpFetcher::from_config(config)),
        FetchBackend::Cobalt => Arc::new(FallbackChain::cobalt_from_config(config)?),
    };

    log::info!("Fetch backend: {}", fetcher.name());
    Ok(fetcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_artifact_accepts_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, b"data").unwrap();

        let artifact = verify_artifact(&path).await.unwrap();
        assert_eq!(artifact.path(), path.as_path());
        assert_eq!(artifact.size(), 4);
    }

    #[tokio::test]
    async fn test_verify_artifact_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        assert!(matches!(verify_artifact(&missing).await, Err(AppError::FetchFailed(_))));

        let empty = dir.path().join("empty.mp4");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(verify_artifact(&empty).await, Err(AppError::FetchFailed(_))));
    }

    #[test]
    fn test_build_fetcher_follows_backend() {
        let config = Config::default();
        assert_eq!(build_fetcher(&config).unwrap().name(), "yt-dlp");

        let mut config = Config::default();
        config.fetch.backend = FetchBackend::Cobalt;
        config.cobalt.instances = vec!["https://one.example".into(), "https://two.example".into()];
        assert_eq!(build_fetcher(&config).unwrap().name(), "cobalt");
    }
}
