//! Override document parsing.
//!
//! A document is YAML in one of three shapes, tried in order:
//!
//! 1. bare `setTags`/`removeTags` map applying to every file under the
//!    document's directory;
//! 2. glob pattern keys, each mapping to either a nested
//!    `setTags`/`removeTags` map or a flat `tag: value` map;
//! 3. a flat `tag: value` map applying to every file.
//!
//! Tag names are lowercased; set values must be string, integer or
//! boolean scalars, coerced to their canonical string form. A
//! top-level glob key literally named `setTags` cannot be expressed,
//! shape 1 claims it first.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use glob::Pattern;
use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{OverridesError, OverridesResult, TagOverridePatch};

// Only strings, integers and booleans are legal tag values; anything
// else fails the decode and invalidates the whole document.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Scalar {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Boolean(v) => v.to_string(),
            Scalar::Integer(v) => v.to_string(),
            Scalar::Text(v) => v,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SetRemove {
    #[serde(default)]
    set_tags: HashMap<String, Scalar>,
    #[serde(default)]
    remove_tags: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ScopedEntry {
    SetRemove(SetRemove),
    Flat(HashMap<String, Scalar>),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Document {
    SetRemove(SetRemove),
    Scoped(HashMap<String, ScopedEntry>),
    Flat(HashMap<String, Scalar>),
}

fn lowercase_sets(set_tags: HashMap<String, Scalar>) -> HashMap<String, String> {
    set_tags
        .into_iter()
        .map(|(name, value)| (name.to_lowercase(), value.into_string()))
        .collect()
}

fn set_remove_patch(base: &Path, pattern: Option<Pattern>, body: SetRemove) -> TagOverridePatch {
    TagOverridePatch {
        base_path: base.to_path_buf(),
        pattern,
        set_tags: lowercase_sets(body.set_tags),
        remove_tags: body
            .remove_tags
            .into_iter()
            .map(|name| name.to_lowercase())
            .collect(),
    }
}

fn flat_patch(
    base: &Path,
    pattern: Option<Pattern>,
    tags: HashMap<String, Scalar>,
) -> TagOverridePatch {
    TagOverridePatch {
        base_path: base.to_path_buf(),
        pattern,
        set_tags: lowercase_sets(tags),
        remove_tags: HashSet::new(),
    }
}

/// Parse one override document found at `path` into its patches.
pub fn parse_document(path: &Path, text: &str) -> OverridesResult<Vec<TagOverridePatch>> {
    let base = path.parent().unwrap_or(Path::new("")).to_path_buf();
    let document: Document =
        serde_yaml::from_str(text).map_err(|source| OverridesError::MalformedDocument {
            path: path.to_path_buf(),
            source,
        })?;

    match document {
        Document::SetRemove(body) => Ok(vec![set_remove_patch(&base, None, body)]),
        Document::Flat(tags) => Ok(vec![flat_patch(&base, None, tags)]),
        Document::Scoped(entries) => {
            let mut patches = Vec::with_capacity(entries.len());
            for (raw_pattern, entry) in entries {
                let pattern = Pattern::new(&raw_pattern).map_err(|source| {
                    OverridesError::InvalidPattern {
                        pattern: raw_pattern.clone(),
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                patches.push(match entry {
                    ScopedEntry::SetRemove(body) => set_remove_patch(&base, Some(pattern), body),
                    ScopedEntry::Flat(tags) => flat_patch(&base, Some(pattern), tags),
                });
            }
            Ok(patches)
        }
    }
}

/// Parse a set of override documents, as (path, raw YAML) pairs.
/// Document discovery is the caller's job.
///
/// A malformed document is logged and skipped; it never fails the
/// batch. Patches keep document discovery order.
pub fn read_tags_files(documents: &[(std::path::PathBuf, String)]) -> Vec<TagOverridePatch> {
    let mut patches = Vec::new();
    for (path, text) in documents {
        match parse_document(path, text) {
            Ok(mut parsed) => {
                debug!(file = %path.display(), patches = parsed.len(), "Loaded override document");
                patches.append(&mut parsed);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping malformed override document");
            }
        }
    }
    patches
}
