//! Container decode/encode for the PCM pipeline.
//!
//! Uploads arrive in whatever container the client had (mp3, flac, ogg,
//! wav, m4a); they are decoded once into [`PcmClip`] form via symphonia,
//! with a hound fast-path for WAV. Produced artifacts are always written
//! as WAV.

use super::{PcmClip, SAMPLE_WIDTH};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unrecognized or corrupt audio container: {0}")]
    Probe(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("no decodable audio track in container")]
    NoAudioTrack,

    #[error("container is missing required parameters: {0}")]
    MissingParams(&'static str),

    #[error("WAV error: {0}")]
    Wav(String),
}

/// Decode an uploaded byte stream into an interleaved i16 PCM clip.
///
/// `ext_hint` is the lowercase filename extension, when known; it seeds the
/// symphonia probe but is not trusted.
pub fn decode_bytes(bytes: &[u8], ext_hint: Option<&str>) -> Result<PcmClip, CodecError> {
    if let Some("wav") = ext_hint {
        if let Ok(clip) = read_wav(bytes) {
            return Ok(clip);
        }
        // Mislabelled uploads fall through to the probe.
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CodecError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(CodecError::NoAudioTrack)?;
    let track_id = track.id;

    let frame_rate = track
        .codec_params
        .sample_rate
        .ok_or(CodecError::MissingParams("sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or(CodecError::MissingParams("channel layout"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    let mut data: Vec<u8> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<i16>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(CodecError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = match sample_buf.as_mut() {
                    Some(buf) => buf,
                    None => {
                        let spec = *decoded.spec();
                        sample_buf
                            .insert(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec))
                    }
                };
                buf.copy_interleaved_ref(decoded);
                for sample in buf.samples() {
                    data.extend_from_slice(&sample.to_le_bytes());
                }
            }
            // A corrupt packet is recoverable, skip it.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(CodecError::Decode(e.to_string())),
        }
    }

    if data.is_empty() {
        return Err(CodecError::NoAudioTrack);
    }
    Ok(PcmClip::new(frame_rate, channels, data))
}

/// Read a WAV byte stream into a PCM clip via hound.
pub fn read_wav(bytes: &[u8]) -> Result<PcmClip, CodecError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| CodecError::Wav(e.to_string()))?;
    let spec = reader.spec();

    let mut data = Vec::new();
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16);
            for sample in reader.into_samples::<i32>() {
                let s = sample.map_err(|e| CodecError::Wav(e.to_string()))?;
                data.extend_from_slice(&((s >> shift) as i16).to_le_bytes());
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.into_samples::<f32>() {
                let s = sample.map_err(|e| CodecError::Wav(e.to_string()))?;
                let scaled = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                data.extend_from_slice(&scaled.to_le_bytes());
            }
        }
    }

    Ok(PcmClip::new(spec.sample_rate, spec.channels, data))
}

/// Encode a PCM clip as a 16-bit WAV byte stream.
pub fn encode_wav(clip: &PcmClip) -> Result<Vec<u8>, CodecError> {
    let spec = hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.frame_rate,
        bits_per_sample: (SAMPLE_WIDTH * 8) as u16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CodecError::Wav(e.to_string()))?;
        for pair in clip.data.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CodecError::Wav(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CodecError::Wav(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
