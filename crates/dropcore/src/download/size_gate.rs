use crate::core::error::{AppError, AppResult};
use crate::download::LocalArtifact;

/// Rejects artifacts above the upload cap before any upload starts.
///
/// The size is re-read from disk, so whatever the fetcher reported does not
/// matter. A rejected file is deleted right away.
#[derive(Debug, Clone, Copy)]
pub struct SizeGate {
    limit: u64,
}

impl SizeGate {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    pub async fn check(&self, artifact: LocalArtifact) -> AppResult<LocalArtifact> {
        let artifact = artifact.refresh().await?;
        let size = artifact.size();

        if size > self.limit {
            log::warn!(
                "Artifact {} is {} bytes, over the {} byte limit; discarding",
                artifact.path().display(),
                size,
                self.limit
            );
            artifact.remove().await;
            return Err(AppError::FileTooLarge { size, limit: self.limit });
        }

        Ok(artifact)
    }
}
