//! Structured probe backend.
//!
//! Runs the probe tool with JSON output (ffprobe-style) and decodes a
//! `streams[] + format` payload into a raw tag map. The probe tool
//! accepts a single input, so the batch `parse` runs one process per
//! file; a per-file failure only drops that file from the result.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{ExtractionError, ExtractionResult, RawTags};
use super::{build_probe_args, Extractor, COVER_ART_PLACEHOLDER};

/// Default probe command template. `%s` expands to `-i <path>`.
pub const DEFAULT_COMMAND: &str =
    "ffprobe -loglevel error -print_format json -show_format -show_streams %s";

/// Structured (JSON) probe extractor.
pub struct FfprobeExtractor {
    command_template: String,
}

impl FfprobeExtractor {
    /// Create an extractor using the given command template, or the
    /// default ffprobe invocation when the template is empty.
    pub fn new(command_template: &str) -> Self {
        let command_template = if command_template.trim().is_empty() {
            DEFAULT_COMMAND.to_string()
        } else {
            command_template.to_string()
        };
        Self { command_template }
    }

    fn probe_file(&self, path: &Path) -> ExtractionResult<Vec<u8>> {
        let program = super::probe_program(&self.command_template)?;
        let args = build_probe_args(&self.command_template, &[path]);
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

        if !output.status.success() {
            return Err(ExtractionError::FileUnreadable {
                path: path.to_path_buf(),
                kind: io::ErrorKind::InvalidData,
            });
        }
        Ok(output.stdout)
    }
}

impl Extractor for FfprobeExtractor {
    fn parse(&self, files: &[PathBuf]) -> ExtractionResult<HashMap<PathBuf, RawTags>> {
        let mut result = HashMap::new();
        for file in files {
            let payload = match self.probe_file(file) {
                Ok(payload) => payload,
                Err(e @ ExtractionError::BackendUnavailable { .. }) => return Err(e),
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Probe failed, skipping file");
                    continue;
                }
            };
            match parse_probe_json(&payload, file) {
                Ok(tags) => {
                    result.insert(file.clone(), tags);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Unusable probe payload, skipping file");
                }
            }
        }
        Ok(result)
    }

    fn custom_mappings(&self) -> &'static [(&'static str, &'static str)] {
        // Legacy disc-number frame, and the Vorbis picture block that
        // doubles as a cover-art marker.
        &[("disc", "tpa"), ("has_picture", "metadata_block_picture")]
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: Disposition,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Disposition {
    #[serde(default)]
    attached_pic: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Decode one file's JSON payload into a raw tag map.
///
/// The first stream with `codec_type == "audio"` is the reference
/// stream; without one the file is not audio. Format-level tags are
/// merged before stream-level tags so container values come first in
/// each key's value list.
pub(crate) fn parse_probe_json(payload: &[u8], path: &Path) -> ExtractionResult<RawTags> {
    let probed: ProbeOutput = serde_json::from_slice(payload)?;

    let audio = probed
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| ExtractionError::NotAudio(path.to_path_buf()))?;

    let mut tags = RawTags::new();

    if probed
        .streams
        .iter()
        .any(|s| s.disposition.attached_pic != 0)
    {
        tags.push("has_picture", "true");
    }

    // Stream duration wins when parseable, else the format-level value.
    let duration = [audio.duration.as_deref(), probed.format.duration.as_deref()]
        .into_iter()
        .flatten()
        .find(|d| d.parse::<f64>().is_ok());
    if let Some(duration) = duration {
        tags.set("duration", duration);
    }

    let bit_rate = [audio.bit_rate.as_deref(), probed.format.bit_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|b| b.parse::<u64>().ok());
    if let Some(bit_rate) = bit_rate {
        tags.set("bitrate", (bit_rate / 1000).to_string());
    }

    for (name, value) in &probed.format.tags {
        tags.push(name, value.clone());
    }
    for stream in &probed.streams {
        for (name, value) in &stream.tags {
            tags.push(name, value.clone());
        }
    }

    // ffmpeg invents a comment tag for embedded cover art.
    if tags.first("comment") == Some(COVER_ART_PLACEHOLDER) {
        tags.remove("comment");
    }

    Ok(tags)
}
