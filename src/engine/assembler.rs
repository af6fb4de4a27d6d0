//! Stem aggregation and remixing.
//!
//! Both entry points share the same building blocks: chunk artifacts are
//! read back one at a time and accumulated, never all decoded at once.

use super::{Engine, EngineError};
use crate::audio::{encode_wav, read_wav, AudioError, CodecError, PcmClip};
use crate::library::{Instrument, MixResult, StemRef};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        EngineError::Assembly(err.to_string())
    }
}

impl From<AudioError> for EngineError {
    fn from(err: AudioError) -> Self {
        EngineError::Assembly(err.to_string())
    }
}

impl Engine {
    /// First assembly, run once when the last job of an item completes.
    ///
    /// Failure leaves the item without a partial result; the latch is
    /// released so a later completion event can retry.
    pub(crate) async fn assemble(self: Arc<Self>, music_id: u64) {
        match self.assemble_inner(music_id).await {
            Ok(()) => info!("Music {} results are available", music_id),
            Err(e) => {
                error!("Assembly of music {} failed: {}", music_id, e);
                let mut items = self.library.guard();
                if let Some(item) = items.iter_mut().find(|m| m.music_id == music_id) {
                    item.assembling = false;
                }
            }
        }
    }

    async fn assemble_inner(&self, music_id: u64) -> Result<(), EngineError> {
        let started = Instant::now();
        let item = self.library.get(music_id).ok_or(EngineError::NotFound)?;

        let mut stems: Vec<(Instrument, PcmClip)> = Instrument::ALL
            .iter()
            .map(|i| (*i, PcmClip::new(0, 0, Vec::new())))
            .collect();
        let mut final_mix = PcmClip::new(0, 0, Vec::new());

        // Jobs in append order == chunk temporal order.
        for job in &item.jobs {
            let mut layers: Option<PcmClip> = None;
            for stem_ref in &job.stem_paths {
                let instrument = match Instrument::from_name(&stem_ref.name) {
                    Some(instrument) => instrument,
                    None => continue,
                };
                let bytes = self.store.read_artifact(&stem_ref.track).await?;
                let chunk = read_wav(&bytes)?;

                if let Some((_, stem)) = stems.iter_mut().find(|(i, _)| *i == instrument) {
                    stem.append(&chunk)?;
                }
                // Only the requested subset contributes to the final mix.
                if job.requested_instruments.contains(&instrument) {
                    layers = Some(match layers {
                        None => chunk,
                        Some(mixed) => mixed.overlay(&chunk)?,
                    });
                }
            }
            if let Some(mixed) = layers {
                final_mix.append(&mixed)?;
            }
        }

        let mut stem_refs = Vec::with_capacity(stems.len());
        for (instrument, stem) in &stems {
            let name = format!("{}_{}.wav", music_id, instrument.name());
            self.store.write_artifact(&name, &encode_wav(stem)?).await?;
            stem_refs.push(StemRef {
                name: instrument.name().to_string(),
                track: name,
            });
        }

        let final_name = format!("combined_{}.wav", music_id);
        self.store
            .write_artifact(&final_name, &encode_wav(&final_mix)?)
            .await?;

        let mut items = self.library.guard();
        let item = items
            .iter_mut()
            .find(|m| m.music_id == music_id)
            .ok_or(EngineError::NotFound)?;
        item.processing_time_secs += started.elapsed().as_secs_f64();
        item.result = Some(MixResult {
            progress: 100,
            processing_time_secs: item.processing_time_secs,
            final_mix: final_name,
            instruments: stem_refs,
        });
        item.assembling = false;
        Ok(())
    }

    /// Remix an already-completed item against a different instrument
    /// subset. No job is recomputed or re-dispatched; only full-length
    /// stems are read. Each remix writes a distinct final-mix artifact so
    /// concurrent readers of the previous link are never corrupted.
    pub(crate) async fn remix(
        &self,
        music_id: u64,
        requested: &[Instrument],
    ) -> Result<MixResult, EngineError> {
        let started = Instant::now();
        let item = self.library.get(music_id).ok_or(EngineError::NotFound)?;
        let previous = item.result.ok_or(EngineError::NotFound)?;

        // Silence canvas sized to the previously stored final mix.
        let prev_bytes = self.store.read_artifact(&previous.final_mix).await?;
        let prev_clip = read_wav(&prev_bytes)?;
        let mut canvas = PcmClip::silence(
            prev_clip.frame_rate,
            prev_clip.channels,
            prev_clip.frame_count(),
        );

        for stem in &previous.instruments {
            let instrument = match Instrument::from_name(&stem.name) {
                Some(instrument) => instrument,
                None => continue,
            };
            if !requested.contains(&instrument) {
                continue;
            }
            let bytes = self.store.read_artifact(&stem.track).await?;
            canvas = canvas.overlay(&read_wav(&bytes)?)?;
        }

        let seq = self.remix_seq.fetch_add(1, Ordering::SeqCst);
        let final_name = format!("combined_{}_{}.wav", seq, music_id);
        self.store
            .write_artifact(&final_name, &encode_wav(&canvas)?)
            .await?;
        info!(
            "Remixed music {} ({} stems) into {}",
            music_id,
            requested.len(),
            final_name
        );

        let mut items = self.library.guard();
        let item = items
            .iter_mut()
            .find(|m| m.music_id == music_id)
            .ok_or(EngineError::NotFound)?;
        item.processing_time_secs += started.elapsed().as_secs_f64();
        let result = match item.result.as_mut() {
            Some(result) => {
                result.final_mix = final_name;
                result.processing_time_secs = item.processing_time_secs;
                result.clone()
            }
            None => return Err(EngineError::NotFound),
        };
        Ok(result)
    }
}
