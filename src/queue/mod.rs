//! Work queue seam.
//!
//! The dispatcher publishes job messages and the result listener consumes
//! result messages; nothing in the engine blocks on a worker. Transports
//! implement [`WorkQueue`]; delivery durability (surviving a broker
//! restart) is the transport's concern and delivery is at-least-once — the
//! engine tolerates duplicates. [`InProcessBroker`] is the bundled
//! transport for single-node runs and tests.

pub mod messages;

pub use messages::{ChunkAudio, JobMessage, ResultMessage, SeparatedAudio, TrackPayload};

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("queue is disconnected")]
    Disconnected,
}

/// Outbound publisher seam. Fire-and-forget: a successful publish means the
/// transport accepted the message, not that any worker processed it.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Publish one unit of work to the job queue.
    async fn publish_job(&self, message: JobMessage) -> Result<(), QueueError>;

    /// Publish one processed-job message to the result queue. Used by
    /// workers (and test harnesses standing in for them).
    async fn publish_result(&self, message: ResultMessage) -> Result<(), QueueError>;
}

/// In-process broker over unbounded channels, carrying the same serialized
/// bodies a remote broker would.
pub struct InProcessBroker {
    job_tx: mpsc::UnboundedSender<Vec<u8>>,
    result_tx: mpsc::UnboundedSender<Vec<u8>>,
    job_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    result_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessBroker {
    pub fn new() -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            job_tx,
            result_tx,
            job_rx: Mutex::new(Some(job_rx)),
            result_rx: Mutex::new(Some(result_rx)),
        }
    }

    /// Take the job-queue consumer side. Single consumer; `None` after the
    /// first call.
    pub fn take_job_receiver(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.job_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Take the result-queue consumer side. Single consumer; `None` after
    /// the first call.
    pub fn take_result_receiver(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.result_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Inject a pre-serialized body on the result channel.
    #[cfg(test)]
    pub fn send_raw_result(&self, body: Vec<u8>) -> Result<(), QueueError> {
        self.result_tx
            .send(body)
            .map_err(|_| QueueError::Disconnected)
    }
}

#[async_trait]
impl WorkQueue for InProcessBroker {
    async fn publish_job(&self, message: JobMessage) -> Result<(), QueueError> {
        let body = serde_json::to_vec(&message)?;
        self.job_tx.send(body).map_err(|_| QueueError::Disconnected)
    }

    async fn publish_result(&self, message: ResultMessage) -> Result<(), QueueError> {
        let body = serde_json::to_vec(&message)?;
        self.result_tx
            .send(body)
            .map_err(|_| QueueError::Disconnected)
    }
}
