//! Patch application and precedence.
//!
//! Applicable patches are ordered by base-path depth, shallowest
//! first, keeping discovery order within a depth; later patches win on
//! conflicting set keys, so the deepest directory's override prevails.
//! Removals from every applicable patch are collected and applied
//! after all sets, a removal always beats a set of the same tag.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use super::types::TagOverridePatch;
use crate::extraction::RawTags;

/// Apply all applicable override patches to one file's raw tags.
pub fn patch_tags(patches: &[TagOverridePatch], file: &Path, tags: &mut RawTags) {
    let mut applicable: Vec<&TagOverridePatch> =
        patches.iter().filter(|p| p.applies_to(file)).collect();
    if applicable.is_empty() {
        return;
    }
    applicable.sort_by_key(|p| p.depth());

    let mut removals: HashSet<&str> = HashSet::new();
    for patch in &applicable {
        for (name, value) in &patch.set_tags {
            tags.set(name, value.clone());
        }
        for name in &patch.remove_tags {
            removals.insert(name);
        }
    }
    for name in removals {
        tags.remove(name);
    }

    debug!(file = %file.display(), patches = applicable.len(), "Applied tag overrides");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::RawTags;
    use glob::Pattern;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn patch(
        base: &str,
        pattern: Option<&str>,
        sets: &[(&str, &str)],
        removes: &[&str],
    ) -> TagOverridePatch {
        TagOverridePatch {
            base_path: PathBuf::from(base),
            pattern: pattern.map(|p| Pattern::new(p).unwrap()),
            set_tags: sets
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect::<HashMap<_, _>>(),
            remove_tags: removes.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> RawTags {
        let mut tags = RawTags::new();
        for (name, value) in pairs {
            tags.push(name, *value);
        }
        tags
    }

    #[test]
    fn set_replaces_extracted_values() {
        let patches = vec![patch("/music", None, &[("artist", "Override")], &[])];
        let mut tags = raw(&[("artist", "Original"), ("title", "Song")]);
        patch_tags(&patches, Path::new("/music/a.mp3"), &mut tags);
        assert_eq!(tags.get("artist").unwrap(), &["Override".to_string()]);
        assert_eq!(tags.first("title"), Some("Song"));
    }

    #[test]
    fn deeper_base_path_wins() {
        let patches = vec![
            patch("/music/album", None, &[("genre", "Funk")], &[]),
            patch("/music", None, &[("genre", "Soul")], &[]),
        ];
        let mut tags = raw(&[("genre", "Rock")]);
        patch_tags(&patches, Path::new("/music/album/a.mp3"), &mut tags);
        assert_eq!(tags.first("genre"), Some("Funk"));
    }

    #[test]
    fn later_document_wins_at_equal_depth() {
        let patches = vec![
            patch("/music/album", None, &[("artist", "First")], &[]),
            patch("/music/album", None, &[("artist", "Second")], &[]),
        ];
        let mut tags = raw(&[]);
        patch_tags(&patches, Path::new("/music/album/a.mp3"), &mut tags);
        assert_eq!(tags.first("artist"), Some("Second"));
    }

    #[test]
    fn removal_beats_any_set() {
        let patches = vec![
            patch("/music", None, &[], &["comment"]),
            patch("/music/album", None, &[("comment", "Kept?")], &[]),
        ];
        let mut tags = raw(&[("comment", "Original")]);
        patch_tags(&patches, Path::new("/music/album/a.mp3"), &mut tags);
        assert!(!tags.contains("comment"));
    }

    #[test]
    fn pattern_limits_scope() {
        let patches = vec![patch("/music", Some("*.flac"), &[("compilation", "1")], &[])];

        let mut flac = raw(&[]);
        patch_tags(&patches, Path::new("/music/a.flac"), &mut flac);
        assert_eq!(flac.first("compilation"), Some("1"));

        let mut mp3 = raw(&[]);
        patch_tags(&patches, Path::new("/music/a.mp3"), &mut mp3);
        assert!(!mp3.contains("compilation"));
    }

    #[test]
    fn unrelated_files_are_untouched() {
        let patches = vec![patch("/music/album", None, &[("artist", "X")], &[])];
        let mut tags = raw(&[("artist", "Original")]);
        patch_tags(&patches, Path::new("/other/a.mp3"), &mut tags);
        assert_eq!(tags.first("artist"), Some("Original"));
    }

    #[test]
    fn set_collapses_multi_valued_tags() {
        let patches = vec![patch("/music", None, &[("genre", "Soul")], &[])];
        let mut tags = raw(&[("genre", "Rock"), ("genre", "Pop")]);
        patch_tags(&patches, Path::new("/music/a.mp3"), &mut tags);
        assert_eq!(tags.get("genre").unwrap(), &["Soul".to_string()]);
    }
}
