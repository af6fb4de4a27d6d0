//! Job orchestration and remix engine.
//!
//! Owns the library, the content store and the outbound queue seam. The
//! HTTP layer calls into it from the request context; the
//! [`ResultListener`] feeds it from the consumer context. All shared-state
//! mutation goes through the library's single mutex.

mod assembler;
mod dispatcher;
mod listener;
mod tracker;

pub use dispatcher::ProcessOutcome;
pub use listener::ResultListener;
pub use tracker::ProgressReport;

use crate::audio;
use crate::library::{music_id_for_bytes, GuardedLibrary, MusicItem};
use crate::queue::{QueueError, WorkQueue};
use crate::store::{ContentStore, StoreError};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Chunk window play length, in milliseconds. Six seconds unless
/// configured otherwise.
pub const DEFAULT_CHUNK_MS: u64 = 6_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("music not found")]
    NotFound,

    #[error("instrument {0} is not in the catalog")]
    InvalidInstrument(u8),

    #[error("assembly failure: {0}")]
    Assembly(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => EngineError::NotFound,
            other => EngineError::Assembly(other.to_string()),
        }
    }
}

pub type GuardedEngine = Arc<Engine>;

pub struct Engine {
    library: GuardedLibrary,
    store: Arc<ContentStore>,
    queue: Arc<dyn WorkQueue>,
    chunk_ms: u64,
    /// Sequence for distinct remix final-mix artifact names; earlier final
    /// mixes are never overwritten.
    remix_seq: AtomicU64,
}

impl Engine {
    pub fn new(
        library: GuardedLibrary,
        store: Arc<ContentStore>,
        queue: Arc<dyn WorkQueue>,
        chunk_ms: u64,
    ) -> Self {
        Self {
            library,
            store,
            queue,
            chunk_ms,
            remix_seq: AtomicU64::new(0),
        }
    }

    pub fn library(&self) -> &GuardedLibrary {
        &self.library
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    /// Submit uploaded bytes: content-addressed and idempotent. Identical
    /// bytes return the existing item with no new storage or metadata
    /// extraction.
    pub async fn submit(&self, bytes: Vec<u8>, filename: &str) -> Result<MusicItem, EngineError> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidInput("empty upload".into()));
        }
        let music_id = music_id_for_bytes(&bytes);
        if let Some(existing) = self.library.get(music_id) {
            info!("Upload of {} deduplicated to music {}", filename, music_id);
            return Ok(existing);
        }

        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        // Validate the stream decodes before any state mutation.
        audio::decode_bytes(&bytes, ext.as_deref())
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let tags = audio::read_tags(&bytes, ext.as_deref());

        self.store
            .save_upload(music_id, &bytes)
            .await
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let item = self
            .library
            .insert(MusicItem::new(music_id, filename.to_string(), tags));
        info!("Registered music {} ({})", music_id, filename);
        Ok(item)
    }

    pub fn list(&self) -> Vec<MusicItem> {
        self.library.list()
    }

    pub fn get(&self, music_id: u64) -> Option<MusicItem> {
        self.library.get(music_id)
    }

    /// Clear all registry state and stored content. Irreversible.
    pub async fn reset(&self) -> Result<(), EngineError> {
        self.library.reset();
        self.store.reset().await?;
        info!("Registry and content store reset");
        Ok(())
    }
}
