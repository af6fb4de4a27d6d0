//! Per-job completion tracking, driven by the result listener.

use super::{Engine, EngineError};
use crate::audio::encode_wav;
use crate::library::{Instrument, JobStatus, MixResult, StemRef};
use crate::queue::ResultMessage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer to a progress poll.
#[derive(Debug)]
pub enum ProgressReport {
    /// Some jobs still pending.
    InProgress(u8),
    /// Every job complete, first assembly still running.
    Finalizing,
    /// Result available.
    Done(MixResult),
}

impl Engine {
    /// Record one processed-job message.
    ///
    /// Idempotent per `job_id`: duplicate delivery re-writes the same chunk
    /// artifacts and re-sets the same terminal status without double
    /// counting progress. Unknown jobs are logged and dropped — they may
    /// belong to a since-reset registry, and no client waits on this path.
    /// A result that does not cover the full instrument catalog is also
    /// dropped, leaving the job pending so a redelivery can repair it.
    pub async fn record_job_result(self: &Arc<Self>, message: ResultMessage) {
        let job_id = message.job_id;
        debug!("Received result for job {}", job_id);

        match self.library.job_owner(job_id) {
            Some(owner) if owner == message.music_id => {}
            Some(owner) => {
                warn!(
                    "Result for job {} names music {} but job belongs to {}; dropping",
                    job_id, message.music_id, owner
                );
                return;
            }
            None => {
                warn!("Result for unknown job {}; dropping", job_id);
                return;
            }
        }

        // Persist one chunk artifact per instrument before touching
        // registry state.
        let mut stem_paths = Vec::with_capacity(message.audio.tracks.len());
        for track in &message.audio.tracks {
            let instrument = match Instrument::from_name(&track.name) {
                Some(instrument) => instrument,
                None => {
                    warn!(
                        "Job {} result carries unknown track '{}'; skipping",
                        job_id, track.name
                    );
                    continue;
                }
            };
            let clip = message.track_clip(track);
            let wav = match encode_wav(&clip) {
                Ok(wav) => wav,
                Err(e) => {
                    warn!("Failed to encode {} chunk of job {}: {}", track.name, job_id, e);
                    return;
                }
            };
            let name = format!(
                "{}_{}_{}.wav",
                message.music_id,
                job_id,
                instrument.name()
            );
            if let Err(e) = self.store.write_artifact(&name, &wav).await {
                warn!("Failed to store {} chunk of job {}: {}", track.name, job_id, e);
                return;
            }
            stem_paths.push(StemRef {
                name: instrument.name().to_string(),
                track: name,
            });
        }

        // A complete job must reference one chunk artifact per catalog
        // instrument; anything less would truncate the assembled stems.
        if stem_paths.len() != Instrument::ALL.len() {
            warn!(
                "Job {} result covers {} of {} catalog tracks; dropping",
                job_id,
                stem_paths.len(),
                Instrument::ALL.len()
            );
            return;
        }

        // Status transition and aggregation trigger decided from one
        // consistent snapshot under the lock.
        let trigger_assembly = {
            let mut items = self.library.guard();
            let item = match items.iter_mut().find(|m| m.music_id == message.music_id) {
                Some(item) => item,
                None => {
                    warn!("Music {} vanished before job {} landed", message.music_id, job_id);
                    return;
                }
            };
            if let Some(start) = item.process_start {
                item.processing_time_secs = start.elapsed().as_secs_f64();
            }
            if let Some(job) = item.jobs.iter_mut().find(|j| j.job_id == job_id) {
                job.stem_paths = stem_paths;
                job.status = JobStatus::Complete;
            }
            let progress = item.progress_percent();
            debug!("Music {} progress now {}%", item.music_id, progress);
            if progress == 100 && item.result.is_none() && !item.assembling {
                item.assembling = true;
                true
            } else {
                false
            }
        };

        if trigger_assembly {
            info!(
                "All jobs of music {} have been received, assembling",
                message.music_id
            );
            // Hand off so a slow assembly does not stall result delivery
            // for unrelated items.
            let engine = Arc::clone(self);
            let music_id = message.music_id;
            tokio::spawn(async move {
                engine.assemble(music_id).await;
            });
        }
    }

    /// Poll aggregate progress for an item.
    pub fn progress(&self, music_id: u64) -> Result<ProgressReport, EngineError> {
        let item = self.library.get(music_id).ok_or(EngineError::NotFound)?;
        if item.jobs.is_empty() {
            return Err(EngineError::NotFound);
        }
        if let Some(result) = item.result {
            return Ok(ProgressReport::Done(result));
        }
        let percent = item.progress_percent();
        if percent == 100 {
            // Terminal completions landed but first assembly has not
            // published a result yet.
            return Ok(ProgressReport::Finalizing);
        }
        Ok(ProgressReport::InProgress(percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{fake_result, test_engine, wait_for_result, wav_upload};
    use crate::engine::ProcessOutcome;
    use crate::library::MusicItem;
    use crate::queue::JobMessage;

    async fn dispatched_item(
        engine: &Arc<Engine>,
        broker: &Arc<crate::queue::InProcessBroker>,
        seconds: u64,
    ) -> (MusicItem, Vec<JobMessage>) {
        let mut job_rx = broker.take_job_receiver().unwrap();
        let item = engine.submit(wav_upload(seconds), "song.wav").await.unwrap();
        let item = match engine.process(item.music_id, &[1, 2]).await.unwrap() {
            ProcessOutcome::Dispatched(item) => item,
            other => panic!("expected dispatch, got {:?}", other),
        };
        let mut messages = Vec::new();
        for _ in 0..item.jobs.len() {
            let body = job_rx.recv().await.unwrap();
            messages.push(serde_json::from_slice(&body).unwrap());
        }
        (item, messages)
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_terminal_at_100() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 13).await;

        assert!(matches!(
            engine.progress(item.music_id).unwrap(),
            ProgressReport::InProgress(0)
        ));

        let mut last = 0u8;
        for message in &messages {
            engine.record_job_result(fake_result(message)).await;
            let percent = match engine.progress(item.music_id).unwrap() {
                ProgressReport::InProgress(p) => p,
                ProgressReport::Finalizing => 100,
                ProgressReport::Done(r) => r.progress,
            };
            assert!(percent >= last);
            last = percent;
        }
        assert_eq!(last, 100);
        wait_for_result(&engine, item.music_id).await;
    }

    #[tokio::test]
    async fn duplicate_delivery_does_not_change_progress() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 13).await;

        engine.record_job_result(fake_result(&messages[0])).await;
        let first = match engine.progress(item.music_id).unwrap() {
            ProgressReport::InProgress(p) => p,
            other => panic!("unexpected report {:?}", other),
        };

        engine.record_job_result(fake_result(&messages[0])).await;
        let second = match engine.progress(item.music_id).unwrap() {
            ProgressReport::InProgress(p) => p,
            other => panic!("unexpected report {:?}", other),
        };

        assert_eq!(first, second);
        // Stem coverage is rewritten, not duplicated.
        let job = engine.library().find_job(messages[0].job_id).unwrap();
        assert_eq!(job.stem_paths.len(), Instrument::ALL.len());
    }

    #[tokio::test]
    async fn partial_track_results_leave_the_job_pending() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 13).await;

        // Only drums delivered for the first chunk.
        let mut partial = fake_result(&messages[0]);
        partial.audio.tracks.truncate(1);
        engine.record_job_result(partial).await;

        assert!(matches!(
            engine.progress(item.music_id).unwrap(),
            ProgressReport::InProgress(0)
        ));
        let job = engine.library().find_job(messages[0].job_id).unwrap();
        assert!(!job.is_complete());
        assert!(job.stem_paths.is_empty());

        // A redelivery with full coverage repairs the job.
        engine.record_job_result(fake_result(&messages[0])).await;
        let job = engine.library().find_job(messages[0].job_id).unwrap();
        assert!(job.is_complete());
        assert_eq!(job.stem_paths.len(), Instrument::ALL.len());
    }

    #[tokio::test]
    async fn empty_track_results_leave_the_job_pending() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 7).await;

        let mut empty = fake_result(&messages[0]);
        empty.audio.tracks.clear();
        engine.record_job_result(empty).await;

        assert!(matches!(
            engine.progress(item.music_id).unwrap(),
            ProgressReport::InProgress(0)
        ));
        assert!(!engine
            .library()
            .find_job(messages[0].job_id)
            .unwrap()
            .is_complete());
    }

    #[tokio::test]
    async fn unknown_job_results_are_dropped() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 7).await;

        let mut stray = fake_result(&messages[0]);
        stray.job_id = 4_242;
        engine.record_job_result(stray).await;

        assert!(matches!(
            engine.progress(item.music_id).unwrap(),
            ProgressReport::InProgress(0)
        ));
    }

    #[tokio::test]
    async fn progress_for_unprocessed_item_is_not_found() {
        let (_dir, engine, _broker) = test_engine();
        let item = engine.submit(wav_upload(2), "song.wav").await.unwrap();
        assert!(matches!(
            engine.progress(item.music_id).unwrap_err(),
            EngineError::NotFound
        ));
        assert!(matches!(
            engine.progress(12345).unwrap_err(),
            EngineError::NotFound
        ));
    }

    #[tokio::test]
    async fn completion_populates_full_result() {
        let (_dir, engine, broker) = test_engine();
        let (item, messages) = dispatched_item(&engine, &broker, 13).await;

        for message in &messages {
            engine.record_job_result(fake_result(message)).await;
        }
        let result = wait_for_result(&engine, item.music_id).await;

        assert_eq!(result.progress, 100);
        assert_eq!(result.instruments.len(), Instrument::ALL.len());
        assert!(engine.store().artifact_exists(&result.final_mix));
        for stem in &result.instruments {
            assert!(engine.store().artifact_exists(&stem.track));
        }
    }
}
