//! Raw PCM clip handling.
//!
//! Everything the orchestration core does to audio (chunking, concatenation,
//! overlay mixing) happens on interleaved signed 16-bit PCM. Container
//! decode/encode lives in [`codec`]; tag extraction in [`metadata`].

pub mod codec;
pub mod metadata;

pub use codec::{decode_bytes, encode_wav, read_wav, CodecError};
pub use metadata::{read_tags, TrackTags};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per sample for the only sample format the mixer operates on.
pub const SAMPLE_WIDTH: u16 = 2;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("clip spec mismatch: {0}Hz/{1}ch vs {2}Hz/{3}ch")]
    SpecMismatch(u32, u16, u32, u16),
}

/// An interleaved signed 16-bit little-endian PCM clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcmClip {
    /// Bytes per sample, always [`SAMPLE_WIDTH`] for clips produced here.
    pub sample_width: u16,
    /// Frames per second.
    pub frame_rate: u32,
    pub channels: u16,
    /// Interleaved sample data.
    pub data: Vec<u8>,
}

impl PcmClip {
    pub fn new(frame_rate: u32, channels: u16, data: Vec<u8>) -> Self {
        Self {
            sample_width: SAMPLE_WIDTH,
            frame_rate,
            channels,
            data,
        }
    }

    /// A clip of silence with the given spec and frame count.
    pub fn silence(frame_rate: u32, channels: u16, frames: usize) -> Self {
        let frame_width = channels as usize * SAMPLE_WIDTH as usize;
        Self::new(frame_rate, channels, vec![0u8; frames * frame_width])
    }

    /// Size in bytes of one frame (all channels of one sample instant).
    pub fn frame_width(&self) -> usize {
        self.channels as usize * self.sample_width as usize
    }

    pub fn frame_count(&self) -> usize {
        if self.frame_width() == 0 {
            return 0;
        }
        self.data.len() / self.frame_width()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.frame_rate == 0 {
            return 0;
        }
        self.frame_count() as u64 * 1000 / self.frame_rate as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn same_spec(&self, other: &PcmClip) -> bool {
        self.frame_rate == other.frame_rate
            && self.channels == other.channels
            && self.sample_width == other.sample_width
    }

    /// Append another clip in time, extending this one.
    pub fn append(&mut self, other: &PcmClip) -> Result<(), AudioError> {
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if !self.same_spec(other) {
            return Err(AudioError::SpecMismatch(
                self.frame_rate,
                self.channels,
                other.frame_rate,
                other.channels,
            ));
        }
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// Mix another clip on top of this one, sample-summed with saturation.
    ///
    /// The result keeps this clip's length: a longer overlay is truncated,
    /// a shorter one leaves the tail untouched.
    pub fn overlay(&self, other: &PcmClip) -> Result<PcmClip, AudioError> {
        if !self.same_spec(other) {
            return Err(AudioError::SpecMismatch(
                self.frame_rate,
                self.channels,
                other.frame_rate,
                other.channels,
            ));
        }
        let mut mixed = self.data.clone();
        let limit = mixed.len().min(other.data.len()) & !1usize;
        for i in (0..limit).step_by(2) {
            let a = i16::from_le_bytes([mixed[i], mixed[i + 1]]);
            let b = i16::from_le_bytes([other.data[i], other.data[i + 1]]);
            let s = a.saturating_add(b).to_le_bytes();
            mixed[i] = s[0];
            mixed[i + 1] = s[1];
        }
        Ok(PcmClip {
            sample_width: self.sample_width,
            frame_rate: self.frame_rate,
            channels: self.channels,
            data: mixed,
        })
    }

    /// Split into fixed-duration windows in source order.
    ///
    /// Windows are cut on frame boundaries, do not overlap, and the final
    /// window may be shorter. Splitting the same clip twice yields
    /// byte-identical windows.
    pub fn split_chunks(&self, window_ms: u64) -> Vec<PcmClip> {
        let frame_width = self.frame_width();
        if frame_width == 0 || self.data.is_empty() || window_ms == 0 {
            return Vec::new();
        }
        let frames_per_window = (self.frame_rate as u64 * window_ms / 1000) as usize;
        if frames_per_window == 0 {
            return Vec::new();
        }
        let bytes_per_window = frames_per_window * frame_width;
        self.data
            .chunks(bytes_per_window)
            .map(|chunk| PcmClip {
                sample_width: self.sample_width,
                frame_rate: self.frame_rate,
                channels: self.channels,
                data: chunk.to_vec(),
            })
            .collect()
    }
}
