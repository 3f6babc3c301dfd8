//! Embedded lyrics parsing.
//!
//! Turns an LRC-style lyric text into a structured [`Lyric`]. Parsing
//! starts in synced mode: metadata ID tags (`[ar:..]`, `[ti:..]`,
//! `[offset:..]`) are honored and content lines carry timestamps. The
//! first content line that matches no timestamp flips the whole lyric
//! to unsynced, permanently: lines parsed earlier keep their
//! timestamps, every later line is plain text even when it looks like
//! a timestamp.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// [ar: Artist]  [ti: Title]  [offset: -150]
static ID_TAG_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(ar|ti|offset):\s*(.+?)\s*\]\s*$").unwrap());

// [mm:ss], [mm:ss.cc], [hh:mm:ss.ccc]
static TIME_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?:(\d+):)?(\d+):(\d+)(?:\.(\d{1,3}))?\](.*)$").unwrap());

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("invalid offset value {value:?}")]
    InvalidOffset {
        value: String,
        source: std::num::ParseIntError,
    },
}

pub type LyricsResult<T> = Result<T, LyricsError>;

/// One line of lyrics, with a start time in milliseconds when synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    pub value: String,
}

/// A parsed lyric body for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lyric {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub display_artist: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub display_title: String,
    pub lang: String,
    pub line: Vec<LyricLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub synced: bool,
}

/// Parse LRC-style lyric text. Single pass, line by line; blank lines
/// are skipped and content lines keep their encounter order.
///
/// A malformed `[offset:..]` value is the only hard error.
pub fn to_lyrics(lang: &str, text: &str) -> LyricsResult<Lyric> {
    let mut lyric = Lyric {
        display_artist: String::new(),
        display_title: String::new(),
        lang: lang.to_string(),
        line: Vec::new(),
        offset: None,
        synced: true,
    };

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !lyric.synced {
            lyric.line.push(LyricLine {
                start: None,
                value: line.to_string(),
            });
            continue;
        }

        if let Some(caps) = ID_TAG_RX.captures(line) {
            let value = &caps[2];
            match &caps[1] {
                "ar" => lyric.display_artist = value.to_string(),
                "ti" => lyric.display_title = value.to_string(),
                "offset" => {
                    let parsed =
                        value
                            .parse::<i64>()
                            .map_err(|source| LyricsError::InvalidOffset {
                                value: value.to_string(),
                                source,
                            })?;
                    lyric.offset = Some(parsed);
                }
                _ => unreachable!(),
            }
            continue;
        }

        if let Some(caps) = TIME_RX.captures(line) {
            lyric.line.push(LyricLine {
                start: Some(timestamp_millis(&caps)),
                value: caps[5].trim().to_string(),
            });
            continue;
        }

        // First plain content line; mode never flips back.
        lyric.synced = false;
        lyric.line.push(LyricLine {
            start: None,
            value: line.to_string(),
        });
    }

    Ok(lyric)
}

/// Millisecond offset of a timestamp capture. The fraction scales by
/// its digit count: `.c` is tenths, `.cc` hundredths, `.ccc` exact.
fn timestamp_millis(caps: &regex::Captures<'_>) -> i64 {
    let hours: i64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let minutes: i64 = caps[2].parse().unwrap_or(0);
    let seconds: i64 = caps[3].parse().unwrap_or(0);
    let fraction: i64 = match caps.get(4) {
        Some(m) => {
            let scale = match m.as_str().len() {
                1 => 100,
                2 => 10,
                _ => 1,
            };
            m.as_str().parse::<i64>().unwrap_or(0) * scale
        }
        None => 0,
    };
    ((hours * 60 + minutes) * 60 + seconds) * 1000 + fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_lyric_with_metadata() {
        let text = "[offset: 1551]\n[ti: A title]\n[ar: An artist]\n[00:00.00]Hi there";
        let lyric = to_lyrics("xxx", text).unwrap();
        assert!(lyric.synced);
        assert_eq!(lyric.display_artist, "An artist");
        assert_eq!(lyric.display_title, "A title");
        assert_eq!(lyric.offset, Some(1551));
        assert_eq!(
            lyric.line,
            vec![LyricLine {
                start: Some(0),
                value: "Hi there".to_string()
            }]
        );
    }

    #[test]
    fn plain_line_flips_synced_permanently() {
        let lyric = to_lyrics("xxx", "[00:00.00]Line one\nplain line\n[00:05.00]Line three").unwrap();
        assert!(!lyric.synced);
        assert_eq!(
            lyric.line,
            vec![
                LyricLine {
                    start: Some(0),
                    value: "Line one".to_string()
                },
                LyricLine {
                    start: None,
                    value: "plain line".to_string()
                },
                // Matches the timestamp pattern, but mode already flipped.
                LyricLine {
                    start: None,
                    value: "[00:05.00]Line three".to_string()
                },
            ]
        );
    }

    #[test]
    fn unsynced_lyric_keeps_plain_lines() {
        let lyric = to_lyrics("xxx", "First line\n\nSecond line\n").unwrap();
        assert!(!lyric.synced);
        assert_eq!(lyric.offset, None);
        assert_eq!(
            lyric.line,
            vec![
                LyricLine {
                    start: None,
                    value: "First line".to_string()
                },
                LyricLine {
                    start: None,
                    value: "Second line".to_string()
                },
            ]
        );
    }

    #[test]
    fn header_tags_become_content_once_desynced() {
        let lyric = to_lyrics("xxx", "plain line\n[ar: Someone]\n").unwrap();
        assert!(!lyric.synced);
        assert_eq!(lyric.display_artist, "");
        assert_eq!(lyric.line[1].value, "[ar: Someone]");
    }

    #[test]
    fn fraction_scales_by_digit_count() {
        for (stamp, expected) in [
            ("[00:01.5]x", 1_500),
            ("[00:01.50]x", 1_500),
            ("[00:01.500]x", 1_500),
            ("[00:01.005]x", 1_005),
            ("[00:01]x", 1_000),
        ] {
            let lyric = to_lyrics("xxx", stamp).unwrap();
            assert_eq!(lyric.line[0].start, Some(expected), "stamp {stamp}");
        }
    }

    #[test]
    fn hour_bearing_timestamps_parse() {
        let lyric = to_lyrics("xxx", "[1:02:03.04]Long opera\n").unwrap();
        assert_eq!(lyric.line[0].start, Some(3_723_040));
    }

    #[test]
    fn malformed_offset_is_an_error() {
        let err = to_lyrics("xxx", "[offset: not-a-number]\n[00:01.00]Line\n").unwrap_err();
        assert!(matches!(err, LyricsError::InvalidOffset { .. }));
    }

    #[test]
    fn serializes_camel_case_and_skips_empty() {
        let lyric = to_lyrics("eng", "[00:01.00]Line\n").unwrap();
        let json = serde_json::to_string(&lyric).unwrap();
        assert!(json.contains("\"lang\":\"eng\""));
        assert!(json.contains("\"synced\":true"));
        assert!(!json.contains("displayArtist"));
        assert!(!json.contains("offset"));
    }
}
