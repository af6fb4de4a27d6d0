//! Best-effort tag extraction from uploaded containers.

use std::io::Cursor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

/// Embedded tags of an upload. All fields are optional: many uploads carry
/// no tags at all and that is not an error.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackTags {
    fn absorb(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) if self.title.is_none() => {
                    self.title = Some(tag.value.to_string());
                }
                Some(StandardTagKey::Artist) if self.artist.is_none() => {
                    self.artist = Some(tag.value.to_string());
                }
                Some(StandardTagKey::Album) if self.album.is_none() => {
                    self.album = Some(tag.value.to_string());
                }
                _ => {}
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

/// Probe the container for embedded tags. Returns empty tags when the
/// container carries none or cannot be probed.
pub fn read_tags(bytes: &[u8], ext_hint: Option<&str>) -> TrackTags {
    let mut tags = TrackTags::default();

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(_) => return tags,
    };

    let mut probed = probed;
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.absorb(revision);
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        tags.absorb(revision);
    }

    tags
}
