//! Content classification.
//!
//! A candidate is matched against an ordered list of rules; the first rule
//! whose predicate holds decides the variant. Rules are plain data so each
//! one can be exercised on its own.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::domain::{CandidateEntry, ContentVariant, EntryKind, Identifier};
use crate::scan::patterns::{
    is_comment_file, is_post_folder, is_story_file, parse_bucket_folder, parse_profile_file,
    parse_story_file, BucketKind, StorySuffix,
};

/// No rule matched the candidate
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("No classification rule matched {name} ({identifier})")]
    NoRuleMatched { identifier: Identifier, name: String },
}

/// One classification rule
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub variant: ContentVariant,
    pub predicate: fn(&CandidateEntry) -> bool,
}

impl ClassificationRule {
    pub fn matches(&self, entry: &CandidateEntry) -> bool {
        (self.predicate)(entry)
    }
}

impl std::fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .finish()
    }
}

/// The rules in evaluation order
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule {
            name: "post",
            variant: ContentVariant::Post,
            predicate: is_post,
        },
        ClassificationRule {
            name: "profile",
            variant: ContentVariant::Profile,
            predicate: is_profile,
        },
        ClassificationRule {
            name: "comment-thread",
            variant: ContentVariant::CommentThread,
            predicate: is_comment_thread,
        },
        ClassificationRule {
            name: "story",
            variant: ContentVariant::Story,
            predicate: is_story,
        },
        ClassificationRule {
            name: "story-collection",
            variant: ContentVariant::StoryCollection,
            predicate: is_story_collection,
        },
    ]
}

/// Assigns a content variant to candidate entries
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentClassifier {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Use a custom rule list
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a candidate. Pure: the same entry always yields the same variant.
    pub fn classify(&self, entry: &CandidateEntry) -> Result<ContentVariant, ClassificationError> {
        for rule in &self.rules {
            if rule.matches(entry) {
                debug!(identifier = %entry.identifier, rule = rule.name, "Classified");
                return Ok(rule.variant);
            }
        }
        Err(ClassificationError::NoRuleMatched {
            identifier: entry.identifier.clone(),
            name: entry.label().to_string(),
        })
    }
}

fn has_metadata_json(entry: &CandidateEntry) -> bool {
    entry.files_ending_with("_metadata.json").next().is_some()
}

/// A video file, anything under `media/`, or a story `raw` file
pub fn has_primary_media(entry: &CandidateEntry) -> bool {
    entry.has_file_under("media") || entry.files.iter().any(|f| is_primary_file(f))
}

pub(crate) fn is_primary_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if parse_story_file(name).is_some_and(|s| s.suffix == StorySuffix::Raw) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4") || e.eq_ignore_ascii_case("mov"))
        .unwrap_or(false)
}

fn has_comments_listing(entry: &CandidateEntry) -> bool {
    entry.has_dir_named("comments") || entry.file_names().any(is_comment_file)
}

fn is_post(entry: &CandidateEntry) -> bool {
    if !has_metadata_json(entry) {
        return false;
    }
    if has_primary_media(entry) && has_comments_listing(entry) {
        return true;
    }
    // Remainder of an interrupted move; the mover moves the metadata file last
    entry.resumed && is_post_folder(&entry.name)
}

fn bucket_kind(entry: &CandidateEntry) -> Option<BucketKind> {
    parse_bucket_folder(entry.label())
        .or_else(|| parse_profile_file(&entry.name))
        .map(|b| b.kind)
}

fn is_profile(entry: &CandidateEntry) -> bool {
    if !entry.identifier.is_derived() {
        return false;
    }
    matches!(
        bucket_kind(entry),
        Some(BucketKind::ProfileFolder | BucketKind::ProfileFile)
    ) || entry.label().to_ascii_lowercase().contains("profile")
}

fn is_comment_thread(entry: &CandidateEntry) -> bool {
    entry.identifier.is_derived()
        && !has_primary_media(entry)
        && entry.label().to_ascii_lowercase().contains("comment")
}

/// Loose story files only; a content folder is never a story
fn is_story(entry: &CandidateEntry) -> bool {
    entry.kind == EntryKind::Files
        && !entry.identifier.is_derived()
        && !entry.files.is_empty()
        && entry.file_names().filter(|n| is_story_file(n)).count() == entry.files.len()
}

fn is_story_collection(entry: &CandidateEntry) -> bool {
    entry.identifier.is_derived()
        && bucket_kind(entry).is_some_and(BucketKind::is_story_grouping)
        && !has_metadata_json(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PathContext;
    use std::path::PathBuf;

    fn entry(identifier: Identifier, kind: EntryKind, name: &str, files: &[&str], dirs: &[&str]) -> CandidateEntry {
        let root = PathBuf::from("/src").join(name);
        CandidateEntry {
            identifier,
            kind,
            name: name.to_string(),
            files: files.iter().map(|f| root.join(f)).collect(),
            dirs: dirs.iter().map(PathBuf::from).collect(),
            root,
            container: None,
            context: PathContext::default(),
            resumed: false,
        }
    }

    fn derived(name: &str) -> Identifier {
        Identifier::derived("evinator", "2026-02-13", name)
    }

    #[test]
    fn test_post_rule() {
        let post = entry(
            Identifier::token("C0de"),
            EntryKind::Folder,
            "evi_IG_POST_20260213_C0de",
            &["evi_C0de_metadata.json", "media/1.jpg"],
            &["comments", "media"],
        );
        assert_eq!(ContentClassifier::new().classify(&post), Ok(ContentVariant::Post));

        // No comments listing: the post rule does not hold
        let rule = &default_rules()[0];
        let no_comments = entry(
            Identifier::token("C0de"),
            EntryKind::Folder,
            "evi_IG_POST_20260213_C0de",
            &["evi_C0de_metadata.json", "media/1.jpg"],
            &["media"],
        );
        assert!(!rule.matches(&no_comments));
    }

    #[test]
    fn test_profile_rule() {
        let name = "IG Profile - 2026-02-13 - Evi - @evinator";
        let profile = entry(derived(name), EntryKind::Folder, name, &["shot.png"], &[]);
        assert_eq!(ContentClassifier::new().classify(&profile), Ok(ContentVariant::Profile));

        let file = "evinator_profile_20260213.png";
        let single = entry(derived(file), EntryKind::Files, file, &[file], &[]);
        assert_eq!(ContentClassifier::new().classify(&single), Ok(ContentVariant::Profile));
    }

    #[test]
    fn test_comment_thread_rule() {
        let name = "IG Regular Comment - 2026-02-13 - @evinator";
        let thread = entry(derived(name), EntryKind::Folder, name, &["1.png", "2.png"], &[]);
        assert_eq!(
            ContentClassifier::new().classify(&thread),
            Ok(ContentVariant::CommentThread)
        );

        // Primary media disqualifies a comment thread
        let with_video = entry(derived(name), EntryKind::Folder, name, &["clip.mp4"], &[]);
        assert!(!(default_rules()[2].predicate)(&with_video));
    }

    #[test]
    fn test_story_rule_beats_named_container() {
        let mut story = entry(
            Identifier::token("abc123"),
            EntryKind::Files,
            "evinator_story_20260213_101500_01_abc123_raw.mp4",
            &["evinator_story_20260213_101500_01_abc123_raw.mp4"],
            &[],
        );
        story.container = Some("IG Stories - 2026-02-13 - Evi Nator - evinator".to_string());
        assert_eq!(ContentClassifier::new().classify(&story), Ok(ContentVariant::Story));
    }

    #[test]
    fn test_story_collection_rule() {
        let name = "IG Stories TXT - 2026-02-13 - @evinator";
        let collection = entry(derived(name), EntryKind::Folder, name, &["1.png", "notes.txt"], &[]);
        assert_eq!(
            ContentClassifier::new().classify(&collection),
            Ok(ContentVariant::StoryCollection)
        );
    }

    #[test]
    fn test_unmatched_entry() {
        let name = "IG Something Else";
        let odd = entry(derived(name), EntryKind::Folder, name, &["x.png"], &[]);
        let err = ContentClassifier::new().classify(&odd).unwrap_err();
        assert!(matches!(err, ClassificationError::NoRuleMatched { .. }));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let story = entry(
            Identifier::token("abc123"),
            EntryKind::Files,
            "x",
            &["evinator_story_20260213_101500_01_abc123_raw.mp4"],
            &[],
        );
        let classifier = ContentClassifier::new();
        let first = classifier.classify(&story);
        for _ in 0..5 {
            assert_eq!(classifier.classify(&story), first);
        }
    }

    #[test]
    fn test_post_folder_remainder_is_never_a_story() {
        let name = "evi_IG_POST_20260213_C0de";
        // Metadata already moved: nothing left to classify it as a post
        let remainder = entry(Identifier::token("C0de"), EntryKind::Folder, name, &["media/1.jpg"], &["media"]);
        assert!(ContentClassifier::new().classify(&remainder).is_err());

        let mut resumed = entry(
            Identifier::token("C0de"),
            EntryKind::Folder,
            name,
            &["evi_C0de_metadata.json"],
            &[],
        );
        assert!(ContentClassifier::new().classify(&resumed).is_err());
        resumed.resumed = true;
        assert_eq!(ContentClassifier::new().classify(&resumed), Ok(ContentVariant::Post));
    }

    #[test]
    fn test_story_rule_needs_story_files() {
        let mixed = entry(
            Identifier::token("abc123"),
            EntryKind::Files,
            "x",
            &["evinator_story_20260213_101500_01_abc123_raw.mp4", "notes.txt"],
            &[],
        );
        assert!(ContentClassifier::new().classify(&mixed).is_err());
    }

    #[test]
    fn test_primary_media() {
        assert!(is_primary_file(Path::new("/a/clip.MOV")));
        assert!(is_primary_file(Path::new(
            "/a/evi_story_20260213_101500_01_abc_raw.jpg"
        )));
        assert!(!is_primary_file(Path::new(
            "/a/evi_story_20260213_101500_01_abc_screenshot.png"
        )));
    }
}
