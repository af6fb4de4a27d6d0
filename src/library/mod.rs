//! In-memory submission registry.
//!
//! All item state lives behind one mutex; both concurrent contexts (request
//! handlers and the result listener) mutate through it, which serializes
//! job creation, status transitions and result population per item. Job ids
//! are issued from an atomic sequence at the moment of job creation.
//!
//! Nothing here survives a restart.

pub mod models;

pub use models::{
    instrument_catalog, Instrument, Job, JobStatus, MixResult, MusicItem, StemRef, TrackInfo,
};

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Range the content digest is reduced into. Collisions within this space
/// are a documented interface-compatibility risk.
const MUSIC_ID_SPACE: u64 = 1_000_000;

/// Content identifier for uploaded bytes: SHA-256 reduced to a bounded
/// integer space. Stable for identical bytes.
pub fn music_id_for_bytes(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % MUSIC_ID_SPACE
}

pub type GuardedLibrary = Arc<MusicLibrary>;

/// The catalog of known music items and the job-id sequence.
pub struct MusicLibrary {
    items: Mutex<Vec<MusicItem>>,
    next_job_id: AtomicU64,
}

impl Default for MusicLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicLibrary {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            next_job_id: AtomicU64::new(0),
        }
    }

    /// Lock the item catalog. Multi-step mutations (dispatch checks,
    /// completion bookkeeping) hold this guard across the whole step.
    pub fn guard(&self) -> MutexGuard<'_, Vec<MusicItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate a globally unique, monotonically increasing job id.
    pub fn allocate_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self, music_id: u64) -> Option<MusicItem> {
        self.guard().iter().find(|m| m.music_id == music_id).cloned()
    }

    pub fn list(&self) -> Vec<MusicItem> {
        self.guard().clone()
    }

    /// Insert a new item unless one with the same id already exists.
    /// Returns the catalog entry either way; idempotent by content id.
    pub fn insert(&self, item: MusicItem) -> MusicItem {
        let mut items = self.guard();
        if let Some(existing) = items.iter().find(|m| m.music_id == item.music_id) {
            return existing.clone();
        }
        items.push(item.clone());
        item
    }

    /// Owning music id of a job, if the job is known.
    pub fn job_owner(&self, job_id: u64) -> Option<u64> {
        self.guard()
            .iter()
            .find(|m| m.jobs.iter().any(|j| j.job_id == job_id))
            .map(|m| m.music_id)
    }

    /// All job ids across the catalog, in item then chunk order.
    pub fn all_job_ids(&self) -> Vec<u64> {
        self.guard()
            .iter()
            .flat_map(|m| m.jobs.iter().map(|j| j.job_id))
            .collect()
    }

    pub fn find_job(&self, job_id: u64) -> Option<Job> {
        self.guard()
            .iter()
            .flat_map(|m| m.jobs.iter())
            .find(|j| j.job_id == job_id)
            .cloned()
    }

    /// Drop every item and restart the job-id sequence. Irreversible.
    pub fn reset(&self) {
        self.guard().clear();
        self.next_job_id.store(0, Ordering::SeqCst);
    }
}
