//! Test audio fixtures and the stand-in separation worker payloads.

use demix_server::audio::{encode_wav, PcmClip};
use demix_server::library::Instrument;
use demix_server::queue::{JobMessage, ResultMessage, SeparatedAudio, TrackPayload};

/// A decodable WAV upload of the given play length (8 kHz mono, non-zero
/// samples so overlays are observable).
pub fn wav_fixture(seconds: u64) -> Vec<u8> {
    let frames = (8_000 * seconds) as usize;
    let mut data = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        data.extend_from_slice(&((i % 251) as i16 * 90).to_le_bytes());
    }
    encode_wav(&PcmClip::new(8_000, 1, data)).expect("fixture encoding failed")
}

/// What a separation worker would send back for one job: every catalog
/// instrument carries a copy of the chunk audio.
pub fn fake_worker_result(job: &JobMessage) -> ResultMessage {
    let tracks = Instrument::ALL
        .iter()
        .map(|i| TrackPayload {
            name: i.name().to_string(),
            data: job.audio.data.clone(),
        })
        .collect();
    ResultMessage {
        music_id: job.music_id,
        job_id: job.job_id,
        audio: SeparatedAudio {
            sample_width: job.audio.sample_width,
            frame_rate: job.audio.frame_rate,
            channels: job.audio.channels,
            format: job.audio.format.clone(),
            tracks,
        },
    }
}
