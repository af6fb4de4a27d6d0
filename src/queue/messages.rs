//! Wire format of the work queue.
//!
//! Bodies are JSON-serialized. One job message per chunk goes out; one
//! result message per chunk comes back with every catalog instrument's
//! separated audio for that chunk.

use crate::audio::PcmClip;
use serde::{Deserialize, Serialize};

/// Outbound unit of work: one chunk of one item, plus everything a worker
/// needs to run separation on it without probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub music_id: u64,
    pub job_id: u64,
    pub audio: ChunkAudio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAudio {
    pub sample_width: u16,
    pub frame_rate: u32,
    pub channels: u16,
    /// Container format of the original upload (descriptive only).
    pub format: String,
    /// Raw interleaved PCM of the chunk.
    pub data: Vec<u8>,
}

impl JobMessage {
    pub fn for_chunk(music_id: u64, job_id: u64, chunk: &PcmClip, format: &str) -> Self {
        Self {
            music_id,
            job_id,
            audio: ChunkAudio {
                sample_width: chunk.sample_width,
                frame_rate: chunk.frame_rate,
                channels: chunk.channels,
                format: format.to_string(),
                data: chunk.data.clone(),
            },
        }
    }

    pub fn clip(&self) -> PcmClip {
        PcmClip::new(
            self.audio.frame_rate,
            self.audio.channels,
            self.audio.data.clone(),
        )
    }
}

/// One separated track of one chunk, named by instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPayload {
    pub name: String,
    /// Raw interleaved PCM of this instrument's share of the chunk.
    pub data: Vec<u8>,
}

/// Inbound processed-job message: all separated tracks for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub music_id: u64,
    pub job_id: u64,
    pub audio: SeparatedAudio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparatedAudio {
    pub sample_width: u16,
    pub frame_rate: u32,
    pub channels: u16,
    pub format: String,
    /// One entry per catalog instrument, covering this single chunk.
    pub tracks: Vec<TrackPayload>,
}

impl ResultMessage {
    pub fn track_clip(&self, track: &TrackPayload) -> PcmClip {
        PcmClip::new(self.audio.frame_rate, self.audio.channels, track.data.clone())
    }
}
