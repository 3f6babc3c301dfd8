//! Textual probe backend.
//!
//! Runs the probe tool once for the whole batch (ffmpeg-style, no JSON)
//! and re-segments its combined stderr/stdout into one block per input
//! file by locating `Input #N, ..., from '<path>'` markers. Each block
//! is scanned line by line: indented `name : value` tag lines,
//! colon-only continuation lines, the `Duration:` summary line and the
//! `Stream #` declarations.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::types::{ExtractionError, ExtractionResult, RawTags};
use super::{build_probe_args, Extractor, COVER_ART_PLACEHOLDER};

/// Default probe command template. `%s` expands to `-i <path>` per file.
pub const DEFAULT_COMMAND: &str = "ffmpeg %s -f ffmetadata";

// Input #0, mp3, from 'groovin.mp3':
static INPUT_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Input #\d+,.*,\sfrom\s'(.*)'").unwrap());

//     TITLE           : Back In Black
static TAG_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {4,6}([\w-]+)\s*:(.*)").unwrap());

//                     : Second line of a multi-line value
static CONTINUATION_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+:(.*)").unwrap());

//   Duration: 00:04:16.00, start: 0.000000, bitrate: 995 kb/s
static DURATION_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s\sDuration: ([\d.:]+).*bitrate: (\d+)").unwrap());

//     Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 192 kb/s
static AUDIO_STREAM_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}Stream #\d+:\d+(?:\([\w-]+\))?: Audio:.*, (\d+) kb/s").unwrap());

//     Stream #0:1: Video: mjpeg, yuvj444p(pc), 600x600 ...
static VIDEO_STREAM_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}Stream #\d+:\d+(?:\([\w-]+\))?: Video:.*").unwrap());

/// Textual probe extractor, one process invocation per batch.
pub struct FfmpegExtractor {
    command_template: String,
}

impl FfmpegExtractor {
    /// Create an extractor using the given command template, or the
    /// default ffmpeg invocation when the template is empty.
    pub fn new(command_template: &str) -> Self {
        let command_template = if command_template.trim().is_empty() {
            DEFAULT_COMMAND.to_string()
        } else {
            command_template.to_string()
        };
        Self { command_template }
    }

    fn run_batch(&self, files: &[PathBuf]) -> ExtractionResult<String> {
        let program = super::probe_program(&self.command_template)?;
        let inputs: Vec<&Path> = files.iter().map(|p| p.as_path()).collect();
        let args = build_probe_args(&self.command_template, &inputs);
        debug!("Running probe: {:?}", args);

        let output = Command::new(program)
            .args(&args[1..])
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ExtractionError::BackendUnavailable {
                        tool: program.to_string(),
                        source: e,
                    }
                }
                _ => ExtractionError::Io(e),
            })?;

        // The banner goes to stderr; a failing exit status is expected
        // because no output file is given. Both channels are combined
        // before parsing.
        let mut combined = String::from_utf8_lossy(&output.stderr).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stdout));
        Ok(combined)
    }
}

impl Extractor for FfmpegExtractor {
    fn parse(&self, files: &[PathBuf]) -> ExtractionResult<HashMap<PathBuf, RawTags>> {
        let combined = self.run_batch(files)?;
        if combined.trim().is_empty() {
            return Err(ExtractionError::UnparseableOutput {
                tool: "ffmpeg".to_string(),
                message: "no output produced".to_string(),
            });
        }
        parse_output(&combined)
    }

    fn custom_mappings(&self) -> &'static [(&'static str, &'static str)] {
        &[("disc", "tpa"), ("has_picture", "metadata_block_picture")]
    }
}

/// Split the combined tool output into per-file blocks and parse each.
///
/// A block that yields zero tags is not a media file and is skipped;
/// zero blocks in non-empty output means the output is unparseable.
pub(crate) fn parse_output(output: &str) -> ExtractionResult<HashMap<PathBuf, RawTags>> {
    let markers: Vec<_> = INPUT_RX.captures_iter(output).collect();
    if markers.is_empty() {
        return Err(ExtractionError::UnparseableOutput {
            tool: "ffmpeg".to_string(),
            message: "no input segments found".to_string(),
        });
    }

    let mut result = HashMap::new();
    for (i, caps) in markers.iter().enumerate() {
        let file = PathBuf::from(&caps[1]);
        let start = caps.get(0).unwrap().end();
        let end = if i + 1 < markers.len() {
            markers[i + 1].get(0).unwrap().start()
        } else {
            output.len()
        };

        let tags = parse_block(&output[start..end]);
        if tags.is_empty() {
            trace!(file = %file.display(), "Not a media file, skipping");
            continue;
        }
        result.insert(file, tags);
    }
    Ok(result)
}

/// Line-oriented scan of a single file's block.
pub(crate) fn parse_block(block: &str) -> RawTags {
    let mut tags = RawTags::new();
    let mut last_tag: Option<String> = None;

    for line in block.lines() {
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = TAG_RX.captures(line) {
            let name = caps[1].trim().to_lowercase();
            tags.push(&name, caps[2].trim());
            last_tag = Some(name);
            continue;
        }

        if let Some(caps) = CONTINUATION_RX.captures(line) {
            if let Some(name) = &last_tag {
                if let Some(value) = tags.first_mut(name) {
                    value.push('\n');
                    value.push_str(caps[1].trim());
                }
                continue;
            }
        }

        if let Some(caps) = DURATION_RX.captures(line) {
            if let Some(secs) = parse_duration(&caps[1]) {
                tags.set("duration", format!("{secs:.2}"));
            }
            tags.set("bitrate", &caps[2]);
            last_tag = None;
            continue;
        }

        if let Some(caps) = AUDIO_STREAM_RX.captures(line) {
            // Streams appear after the Duration summary, so a stream
            // bitrate overwrites the summary-level one.
            tags.set("bitrate", &caps[1]);
            last_tag = None;
            continue;
        }

        if VIDEO_STREAM_RX.is_match(line) {
            tags.set("has_picture", "true");
            last_tag = None;
            continue;
        }

        last_tag = None;
    }

    if tags.first("comment") == Some(COVER_ART_PLACEHOLDER) {
        tags.remove("comment");
    }
    tags
}

/// Parse `H:MM:SS(.cc)` into seconds.
fn parse_duration(value: &str) -> Option<f64> {
    let mut parts = value.split(':').rev();
    let seconds: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next().map_or(Ok(0.0), str::parse).ok()?;
    let hours: f64 = parts.next().map_or(Ok(0.0), str::parse).ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"ffmpeg version 4.4 Copyright (c) 2000-2021 the FFmpeg developers
Input #0, mp3, from '/music/aretha.mp3':
  Metadata:
    title           : Respect
    artist          : Aretha Franklin
    comment         : First line
                    : Second line
                    : Third line
  Duration: 00:02:27.00, start: 0.000000, bitrate: 995 kb/s
    Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 192 kb/s
    Stream #0:1: Video: mjpeg, yuvj444p(pc, bt470bg/unknown/unknown), 600x600
Input #1, flac, from '/music/nina.flac':
  Metadata:
    TITLE           : Feeling Good
    DATE            : 1965
  Duration: 00:02:57.66, start: 0.000000, bitrate: 320 kb/s
Input #2, png_pipe, from '/music/cover.png':
  Duration: N/A, bitrate: N/A
"#;

    #[test]
    fn segments_batch_output_per_file() {
        let result = parse_output(OUTPUT).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.contains_key(Path::new("/music/aretha.mp3")));
        assert!(result.contains_key(Path::new("/music/nina.flac")));
    }

    #[test]
    fn skips_blocks_without_tags() {
        let result = parse_output(OUTPUT).unwrap();
        assert!(!result.contains_key(Path::new("/music/cover.png")));
    }

    #[test]
    fn merges_continuation_lines_into_first_value() {
        let result = parse_output(OUTPUT).unwrap();
        let tags = &result[Path::new("/music/aretha.mp3")];
        assert_eq!(
            tags.first("comment"),
            Some("First line\nSecond line\nThird line")
        );
    }

    #[test]
    fn stream_bitrate_overwrites_summary_bitrate() {
        let result = parse_output(OUTPUT).unwrap();
        let tags = &result[Path::new("/music/aretha.mp3")];
        assert_eq!(tags.first("bitrate"), Some("192"));
        let flac = &result[Path::new("/music/nina.flac")];
        assert_eq!(flac.first("bitrate"), Some("320"));
    }

    #[test]
    fn video_stream_marks_picture() {
        let result = parse_output(OUTPUT).unwrap();
        let tags = &result[Path::new("/music/aretha.mp3")];
        assert_eq!(tags.first("has_picture"), Some("true"));
    }

    #[test]
    fn duration_converts_to_seconds() {
        let result = parse_output(OUTPUT).unwrap();
        let tags = &result[Path::new("/music/aretha.mp3")];
        assert_eq!(tags.first("duration"), Some("147.00"));
        let flac = &result[Path::new("/music/nina.flac")];
        assert_eq!(flac.first("duration"), Some("177.66"));
    }

    #[test]
    fn lower_cases_tag_names() {
        let result = parse_output(OUTPUT).unwrap();
        let tags = &result[Path::new("/music/nina.flac")];
        assert_eq!(tags.first("title"), Some("Feeling Good"));
        assert_eq!(tags.first("date"), Some("1965"));
    }

    #[test]
    fn repeated_tag_lines_append_values() {
        let block = "  Metadata:\n    genre           : Soul\n    genre           : Funk\n";
        let tags = parse_block(block);
        assert_eq!(
            tags.get("genre").unwrap(),
            &["Soul".to_string(), "Funk".to_string()]
        );
    }

    #[test]
    fn other_lines_reset_continuation_state() {
        let block = "    title           : One\n  Something else entirely\n                    : orphan\n";
        let tags = parse_block(block);
        assert_eq!(tags.first("title"), Some("One"));
    }

    #[test]
    fn removes_cover_art_placeholder_comment() {
        let block = "    comment         : Cover (front)\n    title           : Song\n";
        let tags = parse_block(block);
        assert!(!tags.contains("comment"));
        assert_eq!(tags.first("title"), Some("Song"));
    }

    #[test]
    fn garbled_output_is_unparseable() {
        let err = parse_output("complete garbage with no markers").unwrap_err();
        assert!(matches!(err, ExtractionError::UnparseableOutput { .. }));
    }

    #[test]
    fn placeholder_only_template_is_backend_unavailable() {
        let err = FfmpegExtractor::new("%s -f ffmetadata").parse(&[]).unwrap_err();
        assert!(matches!(err, ExtractionError::BackendUnavailable { .. }));
    }
}
