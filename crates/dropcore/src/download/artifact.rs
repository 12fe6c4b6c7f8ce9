//! Local artifacts and the per-request directory that owns them.
//!
//! Every request gets its own `JobDir` (`<download_dir>/<chat>-<uuid>`), so
//! concurrent requests never collide on file names. Dropping the `JobDir`
//! removes the directory with the artifact and any partial files the engine
//! left, on every exit path.

use std::io;
use std::path::{Path, PathBuf};

use lazy_regex::regex_is_match;
use uuid::Uuid;

use crate::core::error::AppResult;

/// Name of the media file inside a job directory
pub const ARTIFACT_FILE_NAME: &str = "video.mp4";

/// A media file produced by a fetcher.
///
/// Not `Clone`: removing it consumes the value, so it is deleted at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalArtifact {
    path: PathBuf,
    size: u64,
}

impl LocalArtifact {
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes as of the last check
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the artifact with its size refreshed from disk.
    pub async fn refresh(self) -> AppResult<Self> {
        let size = fs_err::tokio::metadata(&self.path).await?.len();
        Ok(Self { size, ..self })
    }

    /// Deletes the file now instead of waiting for the job cleanup.
    pub async fn remove(self) {
        match fs_err::tokio::remove_file(&self.path).await {
            Ok(()) => log::debug!("Removed artifact {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove artifact: {}", e),
        }
    }
}

/// Scope guard for a request's scratch directory.
#[derive(Debug)]
pub struct JobDir {
    path: PathBuf,
}

impl JobDir {
    /// Creates a fresh, uniquely named directory under `root`.
    pub async fn create(root: &Path, chat_id: i64) -> AppResult<Self> {
        let path = root.join(format!("{}-{}", chat_id, Uuid::new_v4().simple()));
        fs_err::tokio::create_dir_all(&path).await?;
        log::debug!("Created job dir {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact path the fetcher has to produce
    pub fn output_path(&self) -> PathBuf {
        self.path.join(ARTIFACT_FILE_NAME)
    }

    /// Moves the artifact out to `dest_dir` before the directory goes away.
    ///
    /// Used by the offline `download` command; the bot never keeps files.
    pub async fn keep(self, artifact: LocalArtifact, dest_dir: &Path) -> AppResult<PathBuf> {
        fs_err::tokio::create_dir_all(dest_dir).await?;
        let file_name = self
            .path
            .file_name()
            .map(|name| format!("{}.mp4", name.to_string_lossy()))
            .unwrap_or_else(|| ARTIFACT_FILE_NAME.to_string());
        let dest = dest_dir.join(file_name);

        if fs_err::tokio::rename(artifact.path(), &dest).await.is_err() {
            // Different filesystem: copy, the original goes with the job dir
            fs_err::tokio::copy(artifact.path(), &dest).await?;
        }
        Ok(dest)
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed job dir {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove job dir {}: {}", self.path.display(), e),
        }
    }
}

fn is_job_dir_name(name: &str) -> bool {
    regex_is_match!(r"^-?\d+-[0-9a-f]{32}$", name)
}

/// Removes job directories left behind by a previous run (crash, kill -9).
///
/// Only entries named like a `JobDir` are touched. Returns how many were removed.
pub async fn purge_stale_jobs(root: &Path) -> AppResult<usize> {
    fs_err::tokio::create_dir_all(root).await?;

    let mut removed = 0;
    let mut entries = fs_err::tokio::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || !is_job_dir_name(&name.to_string_lossy()) {
            continue;
        }

        match fs_err::tokio::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to purge stale job dir: {}", e),
        }
    }

    if removed > 0 {
        log::info!("Purged {} stale job dir(s) from {}", removed, root.display());
    }
    Ok(removed)
}
