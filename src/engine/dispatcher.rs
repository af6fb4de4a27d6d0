//! Processing-request dispatch: chunk the item, record jobs, publish work.

use super::{Engine, EngineError};
use crate::audio;
use crate::library::{Instrument, Job, JobStatus, MixResult, MusicItem};
use crate::queue::JobMessage;
use std::time::Instant;
use tracing::{info, warn};

/// What a processing request resolved to.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// First-ever processing: jobs created and published.
    Dispatched(MusicItem),
    /// Jobs already in flight (or a concurrent request beat this one);
    /// nothing new was dispatched.
    InFlight(MusicItem),
    /// The item was fully processed before: served from cache via the
    /// remix path, no dispatch.
    Remixed(MixResult),
}

enum Plan {
    Dispatch,
    Remix,
    InFlight(MusicItem),
}

impl Engine {
    /// Handle a processing request for a known item.
    ///
    /// Validation errors mutate nothing. Dispatch is serialized per item:
    /// the decision is made under the registry lock and latched, so two
    /// concurrent requests for the same new item cannot both publish.
    pub async fn process(
        &self,
        music_id: u64,
        requested_ids: &[u8],
    ) -> Result<ProcessOutcome, EngineError> {
        if requested_ids.is_empty() {
            return Err(EngineError::InvalidInput("no instruments requested".into()));
        }
        let mut requested = Vec::with_capacity(requested_ids.len());
        for id in requested_ids {
            requested.push(Instrument::from_id(*id).ok_or(EngineError::InvalidInstrument(*id))?);
        }

        let plan = {
            let mut items = self.library.guard();
            let item = items
                .iter_mut()
                .find(|m| m.music_id == music_id)
                .ok_or(EngineError::NotFound)?;
            item.process_start = Some(Instant::now());
            if item.result.is_some() {
                Plan::Remix
            } else if !item.jobs.is_empty() || item.dispatching {
                Plan::InFlight(item.clone())
            } else {
                item.dispatching = true;
                Plan::Dispatch
            }
        };

        match plan {
            Plan::Remix => Ok(ProcessOutcome::Remixed(
                self.remix(music_id, &requested).await?,
            )),
            Plan::InFlight(item) => {
                info!("Music {} already has jobs in flight, not re-dispatching", music_id);
                Ok(ProcessOutcome::InFlight(item))
            }
            Plan::Dispatch => match self.dispatch(music_id, requested).await {
                Ok(item) => Ok(ProcessOutcome::Dispatched(item)),
                Err(err) => {
                    // Release the latch so a later request can retry.
                    let mut items = self.library.guard();
                    if let Some(item) = items.iter_mut().find(|m| m.music_id == music_id) {
                        item.dispatching = false;
                    }
                    Err(err)
                }
            },
        }
    }

    /// First-ever dispatch of an item: split into windows, create one job
    /// per window and publish one durable work message per window.
    async fn dispatch(
        &self,
        music_id: u64,
        requested: Vec<Instrument>,
    ) -> Result<MusicItem, EngineError> {
        let item = self.library.get(music_id).ok_or(EngineError::NotFound)?;
        let format = item.extension().to_string();

        let bytes = self.store.read_upload(music_id).await?;
        let clip = audio::decode_bytes(&bytes, Some(format.as_str()))
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        let chunks = clip.split_chunks(self.chunk_ms);
        if chunks.is_empty() {
            return Err(EngineError::InvalidInput("upload contains no audio".into()));
        }

        let mut jobs = Vec::with_capacity(chunks.len());
        let mut messages = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            // Ids are allocated one by one at job creation time.
            let job_id = self.library.allocate_job_id();
            jobs.push(Job {
                job_id,
                music_id,
                status: JobStatus::Pending,
                size: chunk.data.len(),
                duration_secs: chunk.duration_ms() / 1000,
                requested_instruments: requested.clone(),
                stem_paths: Vec::new(),
            });
            messages.push(JobMessage::for_chunk(music_id, job_id, chunk, &format));
        }

        // Commit registry state before anything is published.
        let snapshot = {
            let mut items = self.library.guard();
            let item = items
                .iter_mut()
                .find(|m| m.music_id == music_id)
                .ok_or(EngineError::NotFound)?;
            item.jobs = jobs;
            item.dispatching = false;
            item.clone()
        };

        info!(
            "Dispatching {} chunk jobs for music {}",
            messages.len(),
            music_id
        );
        for message in messages {
            // Fire-and-forget; completion is observed via the listener.
            // There is no automatic retry of a failed publish.
            if let Err(e) = self.queue.publish_job(message).await {
                warn!("Failed to publish job for music {}: {}", music_id, e);
                return Err(e.into());
            }
        }

        Ok(snapshot)
    }
}
