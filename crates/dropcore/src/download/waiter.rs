//! Waiting for a background fetch to produce its file.
//!
//! The fetch runs in its own task and reports through a oneshot channel, so
//! completion is an event rather than something discovered by polling the
//! filesystem. The waiter still wakes up every `interval` to let the caller
//! refresh its status message, and gives up once the budget is spent. Giving
//! up aborts the task; dropping the fetch future kills the engine's whole
//! process group (see [`run_with_timeout`](crate::core::process::run_with_timeout)).
//!
//! A tick that takes longer than one interval is abandoned, so a slow chat
//! API cannot hold up completion or the budget.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::core::config::Config;
use crate::core::error::{AppError, AppResult};
use crate::download::{verify_artifact, FetchRequest, Fetcher, LocalArtifact};

/// A fetch running in the background.
///
/// Dropping the handle aborts the fetch.
pub struct FetchHandle {
    rx: oneshot::Receiver<AppResult<LocalArtifact>>,
    task: JoinHandle<()>,
    expected: PathBuf,
}

impl FetchHandle {
    /// Path the artifact must appear at
    pub fn expected_path(&self) -> &std::path::Path {
        &self.expected
    }

    /// Aborts the fetch and waits until its task has been torn down.
    pub async fn cancel(&mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts `fetcher` on `request` in a new task.
pub fn spawn_fetch(fetcher: Arc<dyn Fetcher>, request: FetchRequest) -> FetchHandle {
    let (tx, rx) = oneshot::channel();
    let expected = request.output_path.clone();

    let task = tokio::spawn(async move {
        let result = fetcher.fetch(&request).await;
        if let Err(ref e) = result {
            log::debug!("[{}] fetch finished with error: {}", fetcher.name(), e);
        }
        // Receiver gone means the waiter already gave up
        let _ = tx.send(result);
    });

    FetchHandle { rx, task, expected }
}

/// Called on every tick while a fetch is still running. Each call is cut
/// off after one interval.
#[async_trait]
pub trait WaitObserver: Send + Sync {
    async fn on_tick(&self, elapsed: Duration);
}

/// Observer that ignores ticks
pub struct NoopObserver;

#[async_trait]
impl WaitObserver for NoopObserver {
    async fn on_tick(&self, _elapsed: Duration) {}
}

enum Waited {
    Finished(AppResult<LocalArtifact>),
    Lost,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct AvailabilityWaiter {
    budget: Duration,
    interval: Duration,
}

impl AvailabilityWaiter {
    pub fn new(budget: Duration, interval: Duration) -> Self {
        Self { budget, interval }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.wait_timeout(), config.poll_interval())
    }

    /// Waits for `handle` to deliver a non-empty file at its expected path.
    ///
    /// # Errors
    /// * `AppError::FetchTimeout` - budget spent; the fetch was cancelled
    /// * whatever the fetcher failed with
    /// * `AppError::FetchFailed` - the fetcher reported success but the file is not there
    pub async fn wait(&self, mut handle: FetchHandle, observer: &dyn WaitObserver) -> AppResult<LocalArtifact> {
        let started = Instant::now();
        let deadline = tokio::time::sleep(self.budget);
        tokio::pin!(deadline);

        let mut ticker = interval_at(started + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let waited = loop {
            tokio::select! {
                result = &mut handle.rx => {
                    break match result {
                        Ok(result) => Waited::Finished(result),
                        Err(_) => Waited::Lost,
                    };
                }
                _ = &mut deadline => break Waited::Expired,
                _ = ticker.tick() => {
                    let tick = observer.on_tick(started.elapsed());
                    if tokio::time::timeout(self.interval, tick).await.is_err() {
                        log::debug!("Tick observer took over {:?}, skipped", self.interval);
                    }
                }
            }
        };

        match waited {
            Waited::Finished(Ok(artifact)) => {
                if artifact.path() != handle.expected_path() {
                    return Err(AppError::FetchFailed(format!(
                        "artifact at {} instead of {}",
                        artifact.path().display(),
                        handle.expected_path().display()
                    )));
                }
                verify_artifact(handle.expected_path()).await
            }
            Waited::Finished(Err(e)) => Err(e),
            Waited::Lost => Err(AppError::FetchFailed("fetch task ended without a result".into())),
            Waited::Expired => {
                log::warn!(
                    "No artifact after {}s, cancelling fetch",
                    self.budget.as_secs_f32()
                );
                handle.cancel().await;
                Err(AppError::FetchTimeout(self.budget))
            }
        }
    }
}
