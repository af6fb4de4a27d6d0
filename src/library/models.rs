//! Data model for the music library.

use crate::audio::TrackTags;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The fixed catalog of instrument categories the separation model
/// produces. Static, identical for every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Drums,
    Vocals,
    Bass,
    Other,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Drums,
        Instrument::Vocals,
        Instrument::Bass,
        Instrument::Other,
    ];

    /// Stable numeric wire id.
    pub fn id(&self) -> u8 {
        match self {
            Instrument::Drums => 1,
            Instrument::Vocals => 2,
            Instrument::Bass => 3,
            Instrument::Other => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Instrument> {
        Instrument::ALL.iter().copied().find(|i| i.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Drums => "drums",
            Instrument::Vocals => "vocals",
            Instrument::Bass => "bass",
            Instrument::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Instrument> {
        Instrument::ALL.iter().copied().find(|i| i.name() == name)
    }
}

/// Catalog listing entry exposed on every music item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    pub track_id: u8,
}

pub fn instrument_catalog() -> Vec<TrackInfo> {
    Instrument::ALL
        .iter()
        .map(|i| TrackInfo {
            name: i.name().to_string(),
            track_id: i.id(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Complete,
}

/// One produced artifact reference: an instrument and the artifact name it
/// is stored under (resolvable via the download route).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StemRef {
    pub name: String,
    pub track: String,
}

/// The unit of dispatched work: one fixed-duration chunk of one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: u64,
    pub music_id: u64,
    pub status: JobStatus,
    /// Chunk PCM byte length.
    pub size: usize,
    /// Chunk play length in whole seconds.
    pub duration_secs: u64,
    /// The instrument subset the triggering request asked to be mixed.
    /// Workers always separate the full catalog regardless.
    pub requested_instruments: Vec<Instrument>,
    /// One chunk artifact per catalog instrument, populated on completion.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stem_paths: Vec<StemRef>,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Complete
    }
}

/// Final output of a fully processed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixResult {
    pub progress: u8,
    pub processing_time_secs: f64,
    /// Artifact name of the mixed-down track for the last-requested subset.
    pub final_mix: String,
    /// One full-length stem per catalog instrument, reusable across remixes.
    pub instruments: Vec<StemRef>,
}

/// A known music item and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicItem {
    /// Content hash of the uploaded bytes reduced to a bounded integer
    /// space. Distinct uploads with colliding reduced hashes are
    /// indistinguishable; accepted interface-compatibility risk.
    pub music_id: u64,
    pub name: String,
    pub metadata: TrackTags,
    pub tracks: Vec<TrackInfo>,
    /// Insertion order equals chunk temporal order; reconstruction
    /// depends on it.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub jobs: Vec<Job>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<MixResult>,
    pub processing_time_secs: f64,
    /// Set when a processing request is recorded, basis for
    /// `processing_time_secs`.
    #[serde(skip)]
    pub process_start: Option<Instant>,
    /// Latched while a first assembly is in flight so two near-simultaneous
    /// final completions cannot both trigger it.
    #[serde(skip)]
    pub assembling: bool,
    /// Latched while a first dispatch is chunking, before jobs exist, so a
    /// concurrent processing request for the same new item cannot also
    /// dispatch.
    #[serde(skip)]
    pub dispatching: bool,
}

impl MusicItem {
    pub fn new(music_id: u64, name: String, metadata: TrackTags) -> Self {
        Self {
            music_id,
            name,
            metadata,
            tracks: instrument_catalog(),
            jobs: Vec::new(),
            result: None,
            processing_time_secs: 0.0,
            process_start: None,
            assembling: false,
            dispatching: false,
        }
    }

    pub fn completed_jobs(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_complete()).count()
    }

    /// Aggregate progress, recomputed from job statuses.
    pub fn progress_percent(&self) -> u8 {
        if self.jobs.is_empty() {
            return 0;
        }
        (self.completed_jobs() * 100 / self.jobs.len()) as u8
    }

    /// Filename extension of the original upload, used for artifact naming.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "wav",
        }
    }
}
