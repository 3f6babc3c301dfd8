//! External tag overrides.
//!
//! Sidecar YAML documents next to the audio files patch the extracted
//! tags before normalization: set values, remove tags, optionally
//! scoped to a glob over the file names under the document's directory.

mod apply;
mod loader;
mod types;

pub use apply::patch_tags;
pub use loader::{parse_document, read_tags_files};
pub use types::{OverridesError, OverridesResult, TagOverridePatch};
