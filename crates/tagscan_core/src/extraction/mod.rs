//! Metadata extraction backends.
//!
//! Three interchangeable backends produce the same raw tag map shape:
//! - [`ffprobe`]: structured (JSON) probe tool output, one process per
//!   file inside the batch call;
//! - [`ffmpeg`]: textual probe tool output, one process for the whole
//!   batch;
//! - [`native`]: in-process reads through the native tagging library.
//!
//! [`extract`] is the entry point: it selects the backend from the
//! scanner settings, runs its parse, attaches file-system metadata and
//! wraps each file's raw tags in the read-only [`Tags`] facade. All
//! parsing is synchronous; parallelism across files belongs to the
//! caller.

pub mod ffmpeg;
pub mod ffprobe;
pub mod native;
mod types;

pub use types::{ExtractionError, ExtractionResult, FileStat, RawTags};

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::ScannerSettings;
use crate::tags::Tags;

/// Comment value some tools invent for embedded cover art.
pub(crate) const COVER_ART_PLACEHOLDER: &str = "Cover (front)";

/// An extraction backend.
///
/// `parse` turns a batch of absolute file paths into per-file raw tag
/// maps. Files that cannot be parsed are absent from the result; only
/// batch-fatal conditions (tool unavailable, uninterpretable output)
/// return an error.
pub trait Extractor {
    fn parse(&self, files: &[PathBuf]) -> ExtractionResult<HashMap<PathBuf, RawTags>>;

    /// Backend-specific alias table, applied after parsing: values of
    /// the alias key are appended under the canonical key.
    fn custom_mappings(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }
}

/// Backend selector. `from_name` accepts the configuration spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Structured,
    Textual,
    NativeLibrary,
}

impl Backend {
    /// Parse a configuration value into a backend.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "structured" => Some(Self::Structured),
            "textual" => Some(Self::Textual),
            "native-library" => Some(Self::NativeLibrary),
            _ => None,
        }
    }

    /// Configuration spelling of this backend.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Textual => "textual",
            Self::NativeLibrary => "native-library",
        }
    }
}

/// Default backend when the configured one is unknown.
pub const DEFAULT_BACKEND: Backend = Backend::NativeLibrary;

/// Extract and normalize tags for a batch of files.
///
/// Per-file failures (unreadable, not audio, native fault) are logged
/// at warning level and the file is simply absent from the result map;
/// no partial `Tags` are ever returned for a failed file.
pub fn extract(
    settings: &ScannerSettings,
    files: &[PathBuf],
) -> ExtractionResult<HashMap<PathBuf, Tags>> {
    let backend = Backend::from_name(&settings.extractor).unwrap_or_else(|| {
        warn!(
            requested = %settings.extractor,
            valid = "structured,textual,native-library",
            default = DEFAULT_BACKEND.name(),
            "Invalid extractor option, using default"
        );
        DEFAULT_BACKEND
    });

    let extractor: Box<dyn Extractor> = match backend {
        Backend::Structured => Box::new(ffprobe::FfprobeExtractor::new(&settings.probe_command)),
        Backend::Textual => Box::new(ffmpeg::FfmpegExtractor::new(&settings.probe_command)),
        Backend::NativeLibrary => Box::new(native::NativeExtractor::new()),
    };

    let parsed = extractor.parse(files)?;

    let mut result = HashMap::new();
    for (path, mut raw) in parsed {
        let stat = match FileStat::for_path(&path) {
            Ok(stat) => stat,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Error stating file, skipping");
                continue;
            }
        };
        raw.apply_aliases(extractor.custom_mappings());
        raw.clean();
        if raw.is_empty() {
            warn!(file = %path.display(), "No usable tags, skipping");
            continue;
        }
        result.insert(path, Tags::new(stat, raw));
    }
    Ok(result)
}

/// The program token of a probe command template: its first token,
/// which must not be the input placeholder. A template that starts
/// with `%s` (or has no tokens) cannot name a tool to run.
pub(crate) fn probe_program(template: &str) -> ExtractionResult<&str> {
    match template.split_whitespace().next() {
        Some(token) if token != "%s" => Ok(token),
        _ => Err(ExtractionError::BackendUnavailable {
            tool: template.trim().to_string(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "command template has no program token",
            ),
        }),
    }
}

/// Expand a probe command template into argv. Every `%s` token becomes
/// one `-i <path>` pair per input; other tokens pass through.
pub(crate) fn build_probe_args(template: &str, inputs: &[&Path]) -> Vec<String> {
    let mut args = Vec::new();
    for token in template.split_whitespace() {
        if token == "%s" {
            for input in inputs {
                args.push("-i".to_string());
                args.push(input.to_string_lossy().into_owned());
            }
        } else {
            args.push(token.to_string());
        }
    }
    args
}
