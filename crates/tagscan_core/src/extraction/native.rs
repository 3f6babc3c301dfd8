//! Native tag library backend.
//!
//! Reads tags in-process through `lofty` instead of spawning a probe
//! tool. The library call is blocking and non-reentrant per invocation;
//! every call owns its probe handle, nothing is shared across files or
//! threads. A `catch_unwind` boundary converts library panics into
//! ordinary per-file errors so a corrupt file can never unwind past the
//! extraction call.
//!
//! Embedded-picture detection deliberately re-opens the file in a
//! second, independent probe: the primary read does not report pictures
//! reliably across all container formats.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use tracing::warn;

use super::types::{ExtractionError, ExtractionResult, RawTags};
use super::Extractor;

/// Raw tag name each library item key is published under. Names match
/// the spellings the probe backends emit so the normalization facade
/// sees one vocabulary.
const TAG_KEYS: &[(&str, ItemKey)] = &[
    ("title", ItemKey::TrackTitle),
    ("titlesort", ItemKey::TrackTitleSortOrder),
    ("album", ItemKey::AlbumTitle),
    ("albumsort", ItemKey::AlbumTitleSortOrder),
    ("artist", ItemKey::TrackArtist),
    ("artistsort", ItemKey::TrackArtistSortOrder),
    ("albumartist", ItemKey::AlbumArtist),
    ("albumartistsort", ItemKey::AlbumArtistSortOrder),
    ("composer", ItemKey::Composer),
    ("genre", ItemKey::Genre),
    ("comment", ItemKey::Comment),
    ("date", ItemKey::RecordingDate),
    ("originaldate", ItemKey::OriginalReleaseDate),
    ("compilation", ItemKey::FlagCompilation),
    ("track", ItemKey::TrackNumber),
    ("tracktotal", ItemKey::TrackTotal),
    ("disc", ItemKey::DiscNumber),
    ("disctotal", ItemKey::DiscTotal),
    ("discsubtitle", ItemKey::SetSubtitle),
    ("catalognumber", ItemKey::CatalogNumber),
    ("bpm", ItemKey::Bpm),
    ("lyrics", ItemKey::Lyrics),
    ("musicbrainz_trackid", ItemKey::MusicBrainzRecordingId),
    ("musicbrainz_releasetrackid", ItemKey::MusicBrainzTrackId),
    ("musicbrainz_albumid", ItemKey::MusicBrainzReleaseId),
    ("musicbrainz_artistid", ItemKey::MusicBrainzArtistId),
    ("musicbrainz_albumartistid", ItemKey::MusicBrainzReleaseArtistId),
    ("musicbrainz_releasegroupid", ItemKey::MusicBrainzReleaseGroupId),
    ("replaygain_album_gain", ItemKey::ReplayGainAlbumGain),
    ("replaygain_album_peak", ItemKey::ReplayGainAlbumPeak),
    ("replaygain_track_gain", ItemKey::ReplayGainTrackGain),
    ("replaygain_track_peak", ItemKey::ReplayGainTrackPeak),
];

/// In-process extractor backed by the native tagging library.
pub struct NativeExtractor {
    parse_options: ParseOptions,
}

impl NativeExtractor {
    /// Create an extractor with default parse options.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    fn read_file(&self, path: &Path) -> ExtractionResult<RawTags> {
        // Stat first so missing files and permission problems surface
        // with a distinguishable kind instead of a library message.
        std::fs::metadata(path).map_err(|e| ExtractionError::FileUnreadable {
            path: path.to_path_buf(),
            kind: e.kind(),
        })?;

        let parse_options = self.parse_options;
        let tagged = catch_unwind(AssertUnwindSafe(|| {
            Probe::open(path)?.options(parse_options).read()
        }))
        .map_err(|panic| ExtractionError::NativeFault(panic_message(&panic)))?
        .map_err(|e| ExtractionError::NativeFault(e.to_string()))?;

        let mut tags = RawTags::new();
        for tag in tagged.tags() {
            for (name, key) in TAG_KEYS {
                for value in tag.get_strings(key) {
                    tags.push(name, value);
                }
            }
        }

        let properties = tagged.properties();
        tags.set(
            "duration",
            format!("{:.2}", properties.duration().as_secs_f64()),
        );
        if let Some(bitrate) = properties.audio_bitrate() {
            tags.set("bitrate", bitrate.to_string());
        }
        if let Some(sample_rate) = properties.sample_rate() {
            tags.set("samplerate", sample_rate.to_string());
        }
        if let Some(channels) = properties.channels() {
            tags.set("channels", channels.to_string());
        }

        if has_embedded_picture(path) {
            tags.set("has_picture", "true");
        }

        Ok(tags)
    }
}

impl Default for NativeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for NativeExtractor {
    fn parse(&self, files: &[PathBuf]) -> ExtractionResult<HashMap<PathBuf, RawTags>> {
        let mut result = HashMap::new();
        for file in files {
            match self.read_file(file) {
                Ok(tags) => {
                    result.insert(file.clone(), tags);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Tag read failed, skipping file");
                }
            }
        }
        Ok(result)
    }

    fn custom_mappings(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }
}

/// Second, independent picture probe. Re-opens the file and reports
/// whether any tag carries an embedded picture; all failures count as
/// "no picture".
fn has_embedded_picture(path: &Path) -> bool {
    let probed = catch_unwind(AssertUnwindSafe(|| {
        Probe::open(path).and_then(|p| p.read())
    }));
    match probed {
        Ok(Ok(tagged)) => tagged.tags().iter().any(|t| !t.pictures().is_empty()),
        _ => false,
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn missing_file_is_unreadable_not_found() {
        let e = NativeExtractor::new()
            .read_file(Path::new("/nonexistent/song.flac"))
            .unwrap_err();
        match e {
            ExtractionError::FileUnreadable { kind, .. } => {
                assert_eq!(kind, io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not an audio file at all").unwrap();

        let result = NativeExtractor::new().parse(&[path.clone()]).unwrap();
        assert!(!result.contains_key(&path));
    }

    #[test]
    fn picture_probe_tolerates_unreadable_files() {
        assert!(!has_embedded_picture(Path::new("/nonexistent/song.flac")));
    }
}
