//! Override patch model and error taxonomy.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use glob::Pattern;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverridesError {
    #[error("malformed override document {path:?}")]
    MalformedDocument {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid glob pattern {pattern:?} in {path:?}")]
    InvalidPattern {
        pattern: String,
        path: PathBuf,
        source: glob::PatternError,
    },
}

pub type OverridesResult<T> = Result<T, OverridesError>;

/// One scoped patch derived from an override document.
///
/// Applies to files under `base_path` whose name relative to it
/// matches `pattern` (no pattern means every file under the base).
#[derive(Debug, Clone)]
pub struct TagOverridePatch {
    pub base_path: PathBuf,
    pub pattern: Option<Pattern>,
    pub set_tags: HashMap<String, String>,
    pub remove_tags: HashSet<String>,
}

impl TagOverridePatch {
    /// Whether this patch applies to the given file path.
    pub fn applies_to(&self, file: &std::path::Path) -> bool {
        let Ok(relative) = file.strip_prefix(&self.base_path) else {
            return false;
        };
        match &self.pattern {
            Some(pattern) => pattern.matches(&relative.to_string_lossy()),
            None => true,
        }
    }

    /// Directory depth of the base path, used for precedence ordering.
    pub(crate) fn depth(&self) -> usize {
        self.base_path.components().count()
    }
}
