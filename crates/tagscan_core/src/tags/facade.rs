//! Tag normalization facade.
//!
//! [`Tags`] combines a backend's raw tag map with file-system metadata
//! and exposes typed accessors. Every accessor is a pure function over
//! immutable state and resolves an ordered fallback chain of alternate
//! raw key spellings: the first non-empty hit wins. No accessor ever
//! panics; failures degrade to the documented zero value.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::extraction::{FileStat, RawTags};
use crate::lyrics::{to_lyrics, Lyric};

// Four-digit year, 1000-2999, anywhere in the date string.
static YEAR_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([12]\d{3})").unwrap());

// "sort" combined as prefix and suffix with "", "_" and "-" separators.
const SORT_FORMATS: [(&str, &str); 6] = [
    ("sort", ""),
    ("sort_", ""),
    ("sort-", ""),
    ("", "sort"),
    ("", "_sort"),
    ("", "-sort"),
];

/// Immutable, normalized view of one file's extracted metadata.
#[derive(Debug, Clone)]
pub struct Tags {
    stat: FileStat,
    raw: RawTags,
}

impl Tags {
    /// Wrap raw extraction output and its file metadata.
    pub fn new(stat: FileStat, raw: RawTags) -> Self {
        Self { stat, raw }
    }

    /// The underlying raw tag map.
    pub fn raw(&self) -> &RawTags {
        &self.raw
    }

    // Common tags

    pub fn title(&self) -> &str {
        self.first_value(&["title", "sort_name", "titlesort"])
    }

    pub fn album(&self) -> &str {
        self.first_value(&["album", "sort_album", "albumsort"])
    }

    pub fn artist(&self) -> &str {
        self.first_value(&["artist", "sort_artist", "artistsort"])
    }

    pub fn album_artist(&self) -> &str {
        self.first_value(&["album_artist", "album artist", "albumartist"])
    }

    pub fn sort_title(&self) -> &str {
        self.sort_tag("tsot", &["title", "name"])
    }

    pub fn sort_album(&self) -> &str {
        self.sort_tag("tsoa", &["album"])
    }

    pub fn sort_artist(&self) -> &str {
        self.sort_tag("tsop", &["artist"])
    }

    pub fn sort_album_artist(&self) -> &str {
        self.sort_tag("tso2", &["albumartist", "album_artist"])
    }

    pub fn genres(&self) -> Vec<&str> {
        self.all_values(&["genre"])
    }

    /// Year plus the validated date string (`YYYY`, `YYYY-MM` or
    /// `YYYY-MM-DD`). Returns `(0, "")` when no 4-digit year is found.
    pub fn date(&self) -> (i32, String) {
        self.date_of(&["date"])
    }

    pub fn original_date(&self) -> (i32, String) {
        self.date_of(&["originaldate"])
    }

    pub fn release_date(&self) -> (i32, String) {
        self.date_of(&["releasedate"])
    }

    pub fn comment(&self) -> &str {
        self.first_value(&["comment"])
    }

    pub fn compilation(&self) -> bool {
        self.bool_value(&["tcmp", "compilation", "wm/iscompilation"])
    }

    /// `(number, total)` from a `N/T` value, or from the sibling
    /// `<name>total` tag when the value has no `/T` part.
    pub fn track_number(&self) -> (u32, u32) {
        self.tuple_value(&["track", "tracknumber"])
    }

    pub fn disc_number(&self) -> (u32, u32) {
        self.tuple_value(&["disc", "discnumber"])
    }

    pub fn disc_subtitle(&self) -> &str {
        self.first_value(&["tsst", "discsubtitle", "setsubtitle"])
    }

    pub fn catalog_num(&self) -> &str {
        self.first_value(&["catalognumber"])
    }

    /// Beats per minute, rounded half-away-from-zero.
    pub fn bpm(&self) -> i32 {
        self.float_value(&["tbpm", "bpm", "fbpm"]).round() as i32
    }

    pub fn has_picture(&self) -> bool {
        !self.first_value(&["has_picture"]).is_empty()
    }

    // MusicBrainz identifiers. Each returns "" unless the raw value is
    // a strictly valid UUID.

    pub fn mbz_release_track_id(&self) -> &str {
        self.mbz_id(&["musicbrainz_releasetrackid", "musicbrainz release track id"])
    }

    pub fn mbz_recording_id(&self) -> &str {
        self.mbz_id(&["musicbrainz_trackid", "musicbrainz track id"])
    }

    pub fn mbz_album_id(&self) -> &str {
        self.mbz_id(&["musicbrainz_albumid", "musicbrainz album id"])
    }

    pub fn mbz_artist_id(&self) -> &str {
        self.mbz_id(&["musicbrainz_artistid", "musicbrainz artist id"])
    }

    pub fn mbz_album_artist_id(&self) -> &str {
        self.mbz_id(&["musicbrainz_albumartistid", "musicbrainz album artist id"])
    }

    pub fn mbz_album_type(&self) -> &str {
        self.first_value(&["musicbrainz_albumtype", "musicbrainz album type"])
    }

    pub fn mbz_album_comment(&self) -> &str {
        self.first_value(&["musicbrainz_albumcomment", "musicbrainz album comment"])
    }

    // Gain properties

    pub fn rg_album_gain(&self) -> f64 {
        self.gain_value("replaygain_album_gain", "r128_album_gain")
    }

    pub fn rg_album_peak(&self) -> f64 {
        self.peak_value("replaygain_album_peak")
    }

    pub fn rg_track_gain(&self) -> f64 {
        self.gain_value("replaygain_track_gain", "r128_track_gain")
    }

    pub fn rg_track_peak(&self) -> f64 {
        self.peak_value("replaygain_track_peak")
    }

    // File properties

    pub fn duration(&self) -> f32 {
        self.float_value(&["duration"]) as f32
    }

    pub fn bit_rate(&self) -> i32 {
        self.int_value(&["bitrate"])
    }

    pub fn sample_rate(&self) -> i32 {
        self.int_value(&["samplerate"])
    }

    pub fn channels(&self) -> i32 {
        self.int_value(&["channels"])
    }

    pub fn file_path(&self) -> &Path {
        &self.stat.path
    }

    pub fn suffix(&self) -> &str {
        &self.stat.suffix
    }

    pub fn size(&self) -> u64 {
        self.stat.size
    }

    pub fn modification_time(&self) -> DateTime<Utc> {
        self.stat.modified
    }

    /// Parse every embedded lyric tag into structured lyrics. Plain
    /// lyric tags get the undetermined language code; `lyrics-<lang>`
    /// tags carry their own.
    pub fn lyrics(&self) -> Vec<Lyric> {
        let mut list = Vec::new();
        for value in self.all_values(&[
            "lyrics",
            "unsynced_lyrics",
            "unsynced lyrics",
            "unsyncedlyrics",
        ]) {
            match to_lyrics("xxx", value) {
                Ok(lyric) => list.push(lyric),
                Err(e) => {
                    warn!(file = %self.stat.path.display(), error = %e, "Failed to parse lyrics")
                }
            }
        }

        for (name, values) in self.raw.iter() {
            if let Some(lang) = name.strip_prefix("lyrics-") {
                let lang = lang.trim();
                let lang = if lang.is_empty() { "xxx" } else { lang };
                for text in values {
                    match to_lyrics(lang, text) {
                        Ok(lyric) => list.push(lyric),
                        Err(e) => {
                            warn!(file = %self.stat.path.display(), error = %e, "Failed to parse lyrics")
                        }
                    }
                }
            }
        }
        list
    }

    // Fallback-chain helpers

    fn first_value(&self, names: &[&str]) -> &str {
        names
            .iter()
            .find_map(|name| self.raw.first(name))
            .unwrap_or("")
    }

    fn all_values(&self, names: &[&str]) -> Vec<&str> {
        names
            .iter()
            .filter_map(|name| self.raw.get(name))
            .flatten()
            .map(|s| s.as_str())
            .collect()
    }

    /// Probe the legacy frame name, then the six deterministic "sort"
    /// permutations of each logical field name, in fixed order.
    fn sort_tag(&self, legacy_frame: &str, names: &[&str]) -> &str {
        if let Some(v) = self.raw.first(legacy_frame) {
            return v;
        }
        for name in names {
            for (prefix, suffix) in SORT_FORMATS {
                if let Some(v) = self.raw.first(&format!("{prefix}{name}{suffix}")) {
                    return v;
                }
            }
        }
        ""
    }

    fn date_of(&self, names: &[&str]) -> (i32, String) {
        let tag = self.first_value(names);
        if tag.len() < 4 {
            return (0, String::new());
        }
        let Some(m) = YEAR_RX.captures(tag) else {
            warn!(file = %self.stat.path.display(), date = tag, "Error parsing year from date field");
            return (0, String::new());
        };
        let year_str = m.get(1).map(|g| g.as_str()).unwrap_or("");
        let year: i32 = year_str.parse().unwrap_or(0);
        if tag.len() < 5 {
            return (year, year_str.to_string());
        }

        // Keep the full date only when it is a valid YYYY-MM(-DD).
        // Truncate to 10 characters, not bytes, so a multi-byte date
        // value can never split a character.
        let cut = tag.char_indices().nth(10).map_or(tag.len(), |(i, _)| i);
        let date = &tag[..cut];
        let valid = NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
            || NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").is_ok();
        if !valid {
            warn!(file = %self.stat.path.display(), date = tag, "Error parsing month and day from date field");
            return (year, year_str.to_string());
        }
        (year, date.to_string())
    }

    fn bool_value(&self, names: &[&str]) -> bool {
        self.first_value(names).trim().parse::<i32>() == Ok(1)
    }

    fn tuple_value(&self, names: &[&str]) -> (u32, u32) {
        for name in names {
            let Some(value) = self.raw.first(name) else {
                continue;
            };
            let mut parts = value.splitn(2, '/');
            let number = parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(0);
            let total = match parts.next() {
                Some(total) => total.trim().parse().unwrap_or(0),
                None => self
                    .raw
                    .first(&format!("{name}total"))
                    .and_then(|t| t.trim().parse().ok())
                    .unwrap_or(0),
            };
            return (number, total);
        }
        (0, 0)
    }

    fn mbz_id(&self, names: &[&str]) -> &str {
        let value = self.first_value(names);
        if Uuid::parse_str(value).is_ok() {
            value
        } else {
            ""
        }
    }

    fn int_value(&self, names: &[&str]) -> i32 {
        self.first_value(names).parse().unwrap_or(0)
    }

    fn float_value(&self, names: &[&str]) -> f64 {
        self.first_value(names).parse().unwrap_or(0.0)
    }

    /// ReplayGain `[-]a.bb dB` value, with an R128 Q7.8 fallback
    /// shifted +5 dB to the ReplayGain reference level.
    fn gain_value(&self, rg_name: &str, r128_name: &str) -> f64 {
        let tag = self.first_value(&[rg_name]);
        if !tag.is_empty() {
            let tag = tag.replacen("dB", "", 1);
            return match tag.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => 0.0,
            };
        }

        let tag = self.first_value(&[r128_name]);
        if !tag.is_empty() {
            return match tag.trim().parse::<i64>() {
                Ok(v) => v as f64 / 256.0 + 5.0,
                Err(_) => 0.0,
            };
        }
        0.0
    }

    fn peak_value(&self, name: &str) -> f64 {
        // A peak of 1 results in no level change.
        match self.first_value(&[name]).parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => 1.0,
        }
    }
}
