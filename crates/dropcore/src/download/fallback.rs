//! Ordered fallback over several fetchers.
//!
//! Strategies are tried strictly in priority order; the first artifact wins
//! and later strategies are never contacted. A video over the size cap ends
//! the chain too, since every source would serve the same file. The whole
//! chain shares one deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::Config;
use crate::core::error::{AppError, AppResult};
use crate::download::{CobaltInstance, FetchRequest, Fetcher, LocalArtifact};

pub struct FallbackChain {
    name: String,
    strategies: Vec<Arc<dyn Fetcher>>,
    timeout: Duration,
}

impl FallbackChain {
    pub fn new(name: impl Into<String>, strategies: Vec<Arc<dyn Fetcher>>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            strategies,
            timeout,
        }
    }

    /// Chain of the configured API instances, in the order they are listed.
    pub fn cobalt_from_config(config: &Config) -> AppResult<Self> {
        let strategies: Vec<Arc<dyn Fetcher>> = CobaltInstance::all_from_config(config)?
            .into_iter()
            .map(|instance| Arc::new(instance) as Arc<dyn Fetcher>)
            .collect();

        if strategies.is_empty() {
            return Err(AppError::InvalidConfig("no cobalt instances configured".into()));
        }
        Ok(Self::new("cobalt", strategies, config.fetch_timeout()))
    }

    async fn try_in_order(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
        let total = self.strategies.len();
        let mut last_error: Option<AppError> = None;

        for (attempt, strategy) in self.strategies.iter().enumerate() {
            log::info!(
                "📡 Fetch attempt {}/{} via [{}]",
                attempt + 1,
                total,
                strategy.name()
            );

            // Leftovers from the previous strategy must not pass as output
            if attempt > 0 {
                let _ = fs_err::tokio::remove_file(&request.output_path).await;
            }

            match strategy.fetch(request).await {
                Ok(artifact) => {
                    log::info!(
                        "✅ [{}] produced {} bytes (attempt {}/{})",
                        strategy.name(),
                        artifact.size(),
                        attempt + 1,
                        total
                    );
                    return Ok(artifact);
                }
                Err(e @ AppError::FileTooLarge { .. }) => {
                    log::warn!("❌ [{}] {}", strategy.name(), e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("❌ [{}] failed: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no strategies configured".to_string());
        Err(AppError::FetchFailed(format!(
            "all {} sources failed, last error: {}",
            total, detail
        )))
    }
}

#[async_trait]
impl Fetcher for FallbackChain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
        match tokio::time::timeout(self.timeout, self.try_in_order(request)).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("[{}] gave up after {}s", self.name, self.timeout.as_secs());
                Err(AppError::FetchTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::core::config::FetchBackend;
    use crate::download::verify_artifact;

    /// Writes fixed bytes, or fails, and counts its calls
    struct Scripted {
        name: &'static str,
        payload: Option<&'static [u8]>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn arc(name: &'static str, payload: Option<&'static [u8]>) -> Arc<Self> {
            Arc::new(Self {
                name,
                payload,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, request: &FetchRequest) -> AppResult<LocalArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.payload {
                Some(bytes) => {
                    fs_err::tokio::write(&request.output_path, bytes).await?;
                    verify_artifact(&request.output_path).await
                }
                None => Err(AppError::FetchFailed(format!("{} is down", self.name))),
            }
        }
    }

    fn request(dir: &std::path::Path) -> FetchRequest {
        FetchRequest {
            url: "https://youtu.be/abc123".to_string(),
            output_path: dir.join("video.mp4"),
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let first = Scripted::arc("first", None);
        let second = Scripted::arc("second", Some(b"ok"));
        let third = Scripted::arc("third", Some(b"never"));
        let chain = FallbackChain::new(
            "test",
            vec![
                first.clone() as Arc<dyn Fetcher>,
                second.clone() as Arc<dyn Fetcher>,
                third.clone() as Arc<dyn Fetcher>,
            ],
            Duration::from_secs(5),
        );

        let dir = tempfile::tempdir().unwrap();
        let artifact = chain.fetch(&request(dir.path())).await.unwrap();

        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"ok");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_video_stops_the_chain() {
        struct TooBig;

        #[async_trait]
        impl Fetcher for TooBig {
            fn name(&self) -> &str {
                "too-big"
            }

            async fn fetch(&self, _request: &FetchRequest) -> AppResult<LocalArtifact> {
                Err(AppError::FileTooLarge { size: 90, limit: 50 })
            }
        }

        let next = Scripted::arc("next", Some(b"ok"));
        let chain = FallbackChain::new(
            "test",
            vec![Arc::new(TooBig) as Arc<dyn Fetcher>, next.clone() as Arc<dyn Fetcher>],
            Duration::from_secs(5),
        );

        let dir = tempfile::tempdir().unwrap();
        let result = chain.fetch(&request(dir.path())).await;

        assert!(matches!(result, Err(AppError::FileTooLarge { size: 90, limit: 50 })));
        assert_eq!(next.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_reports_last_error() {
        let chain = FallbackChain::new(
            "test",
            vec![
                Scripted::arc("a", None) as Arc<dyn Fetcher>,
                Scripted::arc("b", None) as Arc<dyn Fetcher>,
            ],
            Duration::from_secs(5),
        );

        let dir = tempfile::tempdir().unwrap();
        match chain.fetch(&request(dir.path())).await {
            Err(AppError::FetchFailed(msg)) => {
                assert!(msg.contains("all 2 sources failed"));
                assert!(msg.contains("b is down"));
            }
            other => panic!("expected FetchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chain_deadline() {
        struct Hang;

        #[async_trait]
        impl Fetcher for Hang {
            fn name(&self) -> &str {
                "hang"
            }

            async fn fetch(&self, _request: &FetchRequest) -> AppResult<LocalArtifact> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(AppError::FetchFailed("unreachable".into()))
            }
        }

        let chain = FallbackChain::new("test", vec![Arc::new(Hang) as Arc<dyn Fetcher>], Duration::from_millis(100));
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            chain.fetch(&request(dir.path())).await,
            Err(AppError::FetchTimeout(_))
        ));
    }

    /// Instance 1 errors, instance 2 answers garbage, instance 3 offers a picker.
    #[tokio::test]
    async fn test_cobalt_instances_fall_through_to_picker() {
        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&broken)
            .await;

        let garbage = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .expect(1)
            .mount(&garbage)
            .await;

        let working = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "picker",
                "picker": [{"type": "video", "url": format!("{}/files/pick.mp4", working.uri())}],
            })))
            .expect(1)
            .mount(&working)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/pick.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"picked video".to_vec()))
            .mount(&working)
            .await;

        let mut config = Config::default();
        config.fetch.backend = FetchBackend::Cobalt;
        config.cobalt.instances = vec![broken.uri(), garbage.uri(), working.uri()];
        let chain = FallbackChain::cobalt_from_config(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let artifact = chain.fetch(&request(dir.path())).await.unwrap();

        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"picked video");
    }

    #[tokio::test]
    async fn test_cobalt_chain_exhausted() {
        let down = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&down)
            .await;

        let mut config = Config::default();
        config.cobalt.instances = vec![down.uri(), down.uri()];
        let chain = FallbackChain::cobalt_from_config(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let result = chain.fetch(&request(dir.path())).await;

        assert!(matches!(result, Err(AppError::FetchFailed(_))));
        assert!(!dir.path().join("video.mp4").exists());
    }
}
