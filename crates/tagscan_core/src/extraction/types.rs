//! Types for metadata extraction.
//!
//! These types represent the raw, backend-agnostic result of reading
//! tags out of an audio file, before any normalization is applied.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error type for extraction operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Probe tool missing or not executable. Fatal for the whole batch.
    #[error("probe tool '{tool}' unavailable: {source}")]
    BackendUnavailable {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// File cannot be read. Per-file skip; the kind distinguishes
    /// missing files from permission problems.
    #[error("cannot read {path} ({kind:?})")]
    FileUnreadable { path: PathBuf, kind: io::ErrorKind },

    /// Tool output could not be interpreted. Fatal for the batch,
    /// since one invocation covers all files.
    #[error("unparseable {tool} output: {message}")]
    UnparseableOutput { tool: String, message: String },

    /// Recognized container with no audio stream. Per-file skip.
    #[error("no audio stream in {0}")]
    NotAudio(PathBuf),

    /// Recovered fault from the native tag library. Per-file skip.
    #[error("native tag library fault: {0}")]
    NativeFault(String),

    /// JSON decode error from the structured probe payload.
    #[error("probe payload error: {0}")]
    Json(#[from] serde_json::Error),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Type alias for extraction results.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Raw tag map produced by an extraction backend.
///
/// Keys are always lower-cased; values are ordered and never empty.
/// A missing key means "not present" — after [`RawTags::clean`] no key
/// maps to an empty list or to blank-only values. Duplicate identical
/// values may persist (container and stream both declaring a tag);
/// accessors read the first value unless iterating all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTags(HashMap<String, Vec<String>>);

impl RawTags {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under a tag name. The name is lower-cased.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.trim().to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replace all values of a tag with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .insert(name.trim().to_lowercase(), vec![value.into()]);
    }

    /// Remove a tag entirely, returning its values if present.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(name)
    }

    /// All values for a tag, in insertion order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(|v| v.as_slice())
    }

    /// First value for a tag.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }

    /// Mutable access to the first value of a tag. Used by the textual
    /// parser to merge continuation lines into a multi-line value.
    pub fn first_mut(&mut self, name: &str) -> Option<&mut String> {
        self.0.get_mut(name).and_then(|v| v.first_mut())
    }

    /// Whether a tag is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of distinct tag names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tags are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (name, values) pairs. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Apply an alias table: for each (canonical, alias) pair, append
    /// the alias's values under the canonical name. The alias key is
    /// kept as-is so callers probing the original spelling still see it.
    pub fn apply_aliases(&mut self, aliases: &[(&str, &str)]) {
        for (canonical, alias) in aliases {
            if let Some(values) = self.0.get(*alias).cloned() {
                self.0.entry((*canonical).to_string()).or_default().extend(values);
            }
        }
    }

    /// Drop blank values and any tag left without values.
    pub fn clean(&mut self) {
        self.0.retain(|_, values| {
            values.retain(|v| !v.trim().is_empty());
            !values.is_empty()
        });
    }
}

impl From<HashMap<String, Vec<String>>> for RawTags {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        let mut tags = RawTags::new();
        for (name, values) in map {
            for value in values {
                tags.push(&name, value);
            }
        }
        tags
    }
}

/// File-system metadata attached to a successfully extracted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    /// Absolute path of the file.
    pub path: PathBuf,

    /// Modification time.
    pub modified: DateTime<Utc>,

    /// Size in bytes.
    pub size: u64,

    /// Lower-cased file suffix, without the dot.
    pub suffix: String,
}

impl FileStat {
    /// Stat a file and build its metadata record.
    pub fn for_path(path: &Path) -> ExtractionResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| ExtractionError::FileUnreadable {
            path: path.to_path_buf(),
            kind: e.kind(),
        })?;
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Self {
            path: path.to_path_buf(),
            modified,
            size: meta.len(),
            suffix: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        })
    }
}
