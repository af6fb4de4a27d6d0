//! On-disk content store.
//!
//! Two flat directories: `uploads/` holds original submissions keyed by
//! their content identifier, `artifacts/` holds everything produced by the
//! workers and the assembler (per-chunk stems, full-length stems, final
//! mixes). Artifact names are opaque to the store; callers build them.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),
}

/// Content-addressed storage for uploads and produced artifacts.
pub struct ContentStore {
    uploads_dir: PathBuf,
    artifacts_dir: PathBuf,
}

impl ContentStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Create both directories if missing.
    pub async fn init(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::create_dir_all(&self.artifacts_dir).await?;
        Ok(())
    }

    pub fn upload_path(&self, music_id: u64) -> PathBuf {
        self.uploads_dir.join(music_id.to_string())
    }

    /// Persist an original upload under its content identifier.
    pub async fn save_upload(&self, music_id: u64, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.upload_path(music_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(path)
    }

    pub async fn read_upload(&self, music_id: u64) -> Result<Vec<u8>, StoreError> {
        let path = self.upload_path(music_id);
        if !path.exists() {
            return Err(StoreError::NotFound(music_id.to_string()));
        }
        Ok(fs::read(path).await?)
    }

    /// Resolve an artifact name to its path, rejecting anything that would
    /// escape the artifacts directory.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.artifacts_dir.join(name))
    }

    pub async fn write_artifact(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(name)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(path)
    }

    pub async fn read_artifact(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.artifact_path(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(fs::read(path).await?)
    }

    pub fn artifact_exists(&self, name: &str) -> bool {
        self.artifact_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Delete every stored upload and artifact. Irreversible.
    pub async fn reset(&self) -> Result<(), StoreError> {
        clear_dir(&self.uploads_dir).await?;
        clear_dir(&self.artifacts_dir).await?;
        Ok(())
    }
}

async fn clear_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() {
            if let Err(e) = fs::remove_file(&path).await {
                warn!("Failed to remove {:?} during reset: {}", path, e);
            }
        }
    }
    Ok(())
}
