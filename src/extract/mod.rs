//! Metadata extraction.
//!
//! Turns a classified candidate into a [`ContentRecord`]. Facts come from the
//! post's `*_metadata.json`, story sidecars (`_caption.txt`, `_info.json`) and,
//! for everything else, the naming conventions of the files and folders.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::classify::is_primary_file;
use crate::domain::record::non_blank;
use crate::domain::{
    CandidateEntry, ContentRecord, ContentVariant, Engagement, LedgerColumn, MediaHint, Resharer,
};
use crate::scan::patterns::{
    find_date, find_handle, parse_bucket_folder, parse_date, parse_post_folder,
    parse_profile_file, parse_story_file, BucketKind, StorySuffix,
};

const RESHARE_CATEGORY: &str = "Reshare";

/// A metadata source was present but could not be used
#[derive(Debug, Error)]
pub enum MetadataParseError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unparseable timestamp '{value}' in {path}")]
    Timestamp { path: PathBuf, value: String },

    #[error("No username could be determined for {name}")]
    MissingUsername { name: String },
}

/// Fields of a post's `*_metadata.json`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct PostMetadata {
    username: Option<String>,
    full_name: Option<String>,
    caption: Option<String>,
    like_count: Option<i64>,
    comment_count: Option<i64>,
    view_count: Option<i64>,
    posted_at: Option<Value>,
    media_type: Option<Value>,
    is_video: Option<bool>,
    #[serde(default)]
    collaborators: Vec<Collaborator>,
}

/// A collaborator is listed either as a bare handle or as an account object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Collaborator {
    Handle(String),
    Account { username: String },
}

impl Collaborator {
    fn handle(&self) -> &str {
        match self {
            Collaborator::Handle(h) => h,
            Collaborator::Account { username } => username,
        }
    }
}

/// Optional `_info.json` story sidecar
#[derive(Debug, Default, Deserialize)]
struct StoryInfo {
    caption: Option<String>,
    like_count: Option<i64>,
    comment_count: Option<i64>,
    view_count: Option<i64>,
    taken_at: Option<Value>,
}

/// Facts recoverable from names alone
#[derive(Debug, Default)]
struct NameFacts {
    username: Option<String>,
    display_name: Option<String>,
    posted_at: Option<NaiveDateTime>,
    collaborators: Vec<String>,
    paired: bool,
    reshare: Option<Resharer>,
}

/// Builds content records from classified candidates
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the record for a classified entry.
    ///
    /// Absent values stay `None`; a metadata file that exists but cannot be
    /// read or parsed is an error.
    pub fn extract(
        &self,
        entry: &CandidateEntry,
        variant: ContentVariant,
    ) -> Result<ContentRecord, MetadataParseError> {
        let names = name_facts(entry);

        let mut record = match variant {
            ContentVariant::Post => self.extract_post(entry, names)?,
            ContentVariant::Story => self.extract_story(entry, names)?,
            ContentVariant::Profile
            | ContentVariant::CommentThread
            | ContentVariant::StoryCollection => self.extract_bucket(entry, variant, names)?,
        };

        record.caption = non_blank(record.caption.take());
        record.display_name = non_blank(record.display_name.take());
        record.engagement = record.engagement.and_then(Engagement::non_empty);

        debug!(
            identifier = %record.identifier,
            variant = %record.variant,
            username = %record.username,
            "Extracted metadata"
        );
        Ok(record)
    }

    fn extract_post(
        &self,
        entry: &CandidateEntry,
        names: NameFacts,
    ) -> Result<ContentRecord, MetadataParseError> {
        let meta_path = entry.files_ending_with("_metadata.json").next().cloned();
        let meta: PostMetadata = match &meta_path {
            Some(path) => read_json(path)?,
            None => PostMetadata::default(),
        };

        let username = non_blank(meta.username.clone())
            .or(names.username.clone())
            .ok_or_else(|| MetadataParseError::MissingUsername {
                name: entry.name.clone(),
            })?;

        let mut record = base_record(entry, ContentVariant::Post, username, names);

        if let Some(name) = non_blank(meta.full_name.clone()) {
            record.display_name = Some(name);
        }
        record.caption = meta.caption.clone();
        record.engagement = Some(engagement(meta.like_count, meta.comment_count, meta.view_count));

        if let (Some(value), Some(path)) = (&meta.posted_at, &meta_path) {
            if let Some(posted) = parse_timestamp(value, path)? {
                record.posted_at = Some(posted);
            }
        }

        for collab in &meta.collaborators {
            let handle = collab.handle().trim();
            if !handle.is_empty() && !record.collaborators.iter().any(|c| c == handle) {
                record.collaborators.push(handle.to_string());
            }
        }

        let media_files: Vec<&PathBuf> = entry
            .files
            .iter()
            .filter(|f| in_media_dir(entry, f))
            .collect();
        record.primary_media = media_files
            .first()
            .map(|p| (*p).clone())
            .or_else(|| first_primary(entry));
        record.media = post_media_hint(&meta, media_files.len(), record.primary_media.as_deref());

        Ok(record)
    }

    fn extract_story(
        &self,
        entry: &CandidateEntry,
        names: NameFacts,
    ) -> Result<ContentRecord, MetadataParseError> {
        let username = names
            .username
            .clone()
            .ok_or_else(|| MetadataParseError::MissingUsername {
                name: entry.name.clone(),
            })?;
        let mut record = base_record(entry, ContentVariant::Story, username, names);

        let mut raw = None;
        let mut caption_file = None;
        let mut info_file = None;
        for file in &entry.files {
            let Some(parsed) = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_story_file)
            else {
                continue;
            };
            match parsed.suffix {
                StorySuffix::Raw if raw.is_none() => raw = Some((file.clone(), parsed.extension)),
                StorySuffix::Caption if parsed.extension == "txt" => caption_file = Some(file),
                StorySuffix::Info if parsed.extension == "json" => info_file = Some(file),
                _ => {}
            }
        }

        match raw {
            Some((path, ext)) => {
                record.media = MediaHint::from_extension(&ext);
                record.primary_media = Some(path);
            }
            None => {
                record.primary_media = first_primary(entry);
                record.media = record
                    .primary_media
                    .as_deref()
                    .map(media_of)
                    .unwrap_or_default();
            }
        }

        if let Some(path) = caption_file {
            let text = std::fs::read_to_string(path).map_err(|source| MetadataParseError::Read {
                path: path.clone(),
                source,
            })?;
            record.caption = Some(text);
        }

        if let Some(path) = info_file {
            let info: StoryInfo = read_json(path)?;
            if non_blank(record.caption.clone()).is_none() {
                record.caption = info.caption.clone();
            }
            record.engagement = Some(engagement(info.like_count, info.comment_count, info.view_count));
            if let Some(value) = &info.taken_at {
                if let Some(taken) = parse_timestamp(value, path)? {
                    record.posted_at = Some(taken);
                }
            }
        }

        Ok(record)
    }

    fn extract_bucket(
        &self,
        entry: &CandidateEntry,
        variant: ContentVariant,
        names: NameFacts,
    ) -> Result<ContentRecord, MetadataParseError> {
        let username = names
            .username
            .clone()
            .ok_or_else(|| MetadataParseError::MissingUsername {
                name: entry.label().to_string(),
            })?;
        let mut record = base_record(entry, variant, username, names);
        record.primary_media = first_primary(entry);
        record.media = record
            .primary_media
            .as_deref()
            .map(media_of)
            .unwrap_or_default();
        Ok(record)
    }
}

/// Record with the name-derived facts applied
fn base_record(
    entry: &CandidateEntry,
    variant: ContentVariant,
    username: String,
    names: NameFacts,
) -> ContentRecord {
    let mut record = ContentRecord::new(
        entry.identifier.clone(),
        variant,
        username,
        entry.root.clone(),
    );
    record.display_name = names.display_name;
    record.posted_at = names.posted_at;
    record.collaborators = names.collaborators;
    record.paired = names.paired;
    record.context = entry.context.clone();

    if let Some(resharer) = names.reshare {
        record.context.resharer = Some(resharer);
        record
            .context
            .tags
            .insert(LedgerColumn::SheetCategories, RESHARE_CATEGORY.to_string());
    }
    record
}

/// Collect username, display name, date and flags from file and folder names
fn name_facts(entry: &CandidateEntry) -> NameFacts {
    let mut facts = NameFacts::default();

    if let Some(post) = parse_post_folder(&entry.name) {
        facts.username = Some(post.username);
        facts.posted_at = parse_date(&post.date).map(midnight);
        facts.collaborators = post.collaborators;
        facts.paired = post.paired;
        return facts;
    }

    let mut stories: Vec<_> = entry
        .file_names()
        .filter_map(parse_story_file)
        .collect();
    stories.sort_by(|a, b| (&a.date, &a.time, &a.seq).cmp(&(&b.date, &b.time, &b.seq)));
    if let Some(story) = stories.first() {
        facts.username = Some(story.username.clone());
        facts.display_name = story.display_name.clone();
        facts.posted_at =
            NaiveDateTime::parse_from_str(&format!("{}{}", story.date, story.time), "%Y%m%d%H%M%S")
                .ok();
        return facts;
    }

    let bucket = parse_bucket_folder(entry.label()).or_else(|| parse_profile_file(&entry.name));
    if let Some(bucket) = bucket {
        facts.username = Some(bucket.handle.clone());
        facts.display_name = bucket.display_name.clone();
        facts.posted_at = parse_date(&bucket.date).map(midnight);
        facts.paired = bucket.paired;
        if bucket.kind == BucketKind::Reshare {
            facts.reshare = Some(Resharer {
                handle: bucket.handle,
                name: bucket.display_name,
            });
        }
        return facts;
    }

    facts.username = find_handle(entry.label());
    facts.posted_at = find_date(entry.label()).map(midnight);
    facts
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, MetadataParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| MetadataParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| MetadataParseError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a timestamp given as RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` or Unix seconds.
///
/// `null` and empty strings are absent values, not errors.
fn parse_timestamp(value: &Value, source: &Path) -> Result<Option<NaiveDateTime>, MetadataParseError> {
    let invalid = || MetadataParseError::Timestamp {
        path: source.to_path_buf(),
        value: value.to_string(),
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| Some(dt.naive_utc()))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Some(dt.naive_local()));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Ok(Some(dt));
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| Some(midnight(d)))
                .map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn engagement(likes: Option<i64>, comments: Option<i64>, views: Option<i64>) -> Engagement {
    // Hidden counters are reported as negative numbers
    let count = |n: Option<i64>| n.and_then(|n| u64::try_from(n).ok());
    Engagement {
        likes: count(likes),
        comments: count(comments),
        views: count(views),
    }
}

fn in_media_dir(entry: &CandidateEntry, file: &Path) -> bool {
    entry
        .relative(file)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| n.eq_ignore_ascii_case("media"))
        .unwrap_or(false)
}

/// First primary media file, or the first file at all
fn first_primary(entry: &CandidateEntry) -> Option<PathBuf> {
    entry
        .files
        .iter()
        .find(|f| is_primary_file(f))
        .or_else(|| entry.files.first())
        .cloned()
}

fn media_of(path: &Path) -> MediaHint {
    path.extension()
        .and_then(|e| e.to_str())
        .map(MediaHint::from_extension)
        .unwrap_or_default()
}

fn post_media_hint(meta: &PostMetadata, media_count: usize, primary: Option<&Path>) -> MediaHint {
    let declared = match &meta.media_type {
        Some(Value::String(s)) => {
            let s = s.to_ascii_lowercase();
            if s.contains("sidecar") || s.contains("carousel") || s.contains("album") {
                Some(MediaHint::Carousel)
            } else if s.contains("video") || s.contains("clip") || s.contains("reel") {
                Some(MediaHint::Video)
            } else if s.contains("image") || s.contains("photo") {
                Some(MediaHint::Image)
            } else {
                None
            }
        }
        Some(Value::Number(n)) => match n.as_u64() {
            Some(1) => Some(MediaHint::Image),
            Some(2) => Some(MediaHint::Video),
            Some(8) => Some(MediaHint::Carousel),
            _ => None,
        },
        _ => None,
    };

    declared
        .or_else(|| (media_count > 1).then_some(MediaHint::Carousel))
        .or_else(|| meta.is_video.filter(|v| *v).map(|_| MediaHint::Video))
        .or_else(|| primary.map(media_of))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ContentClassifier;
    use crate::scan::FolderScanner;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn extract_all(root: &Path) -> Vec<Result<ContentRecord, MetadataParseError>> {
        let classifier = ContentClassifier::new();
        let extractor = MetadataExtractor::new();
        FolderScanner::new(root)
            .scan()
            .unwrap()
            .into_iter()
            .map(|entry| {
                let variant = classifier.classify(&entry).unwrap();
                extractor.extract(&entry, variant)
            })
            .collect()
    }

    #[test]
    fn test_post_metadata() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("healer_IG_POST_20260213_C0de_collab_mayu - PAIRED");
        write(
            &post.join("healer_C0de_metadata.json"),
            r#"{"username": "healer", "full_name": "The Healer", "caption": "  hello ",
                "like_count": 12, "comment_count": -1, "posted_at": "2026-02-12T08:30:00+00:00",
                "media_type": "GraphSidecar", "collaborators": ["mayu", {"username": "other"}]}"#,
        );
        write(&post.join("media/1.jpg"), "x");
        write(&post.join("media/2.mp4"), "x");
        fs::create_dir_all(post.join("comments")).unwrap();

        let record = extract_all(temp.path()).pop().unwrap().unwrap();
        assert_eq!(record.variant, ContentVariant::Post);
        assert_eq!(record.identifier.as_str(), "C0de");
        assert_eq!(record.username, "healer");
        assert_eq!(record.display_name.as_deref(), Some("The Healer"));
        assert_eq!(record.caption.as_deref(), Some("hello"));
        assert_eq!(record.engagement.unwrap().likes, Some(12));
        assert_eq!(record.engagement.unwrap().comments, None);
        assert_eq!(record.media, MediaHint::Carousel);
        assert_eq!(record.collaborators, vec!["mayu".to_string(), "other".to_string()]);
        assert!(record.paired);
        assert_eq!(
            record.posted_at.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2026-02-12 08:30"
        );
        assert_eq!(record.primary_media, Some(post.join("media/1.jpg")));
    }

    #[test]
    fn test_malformed_metadata_is_an_error() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("evi_IG_POST_20260213_C0de");
        write(&post.join("evi_C0de_metadata.json"), "{not json");
        write(&post.join("media/1.jpg"), "x");
        fs::create_dir_all(post.join("comments")).unwrap();

        let result = extract_all(temp.path()).pop().unwrap();
        assert!(matches!(result, Err(MetadataParseError::Json { .. })));
    }

    #[test]
    fn test_unparseable_timestamp_is_an_error() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("evi_IG_POST_20260213_C0de");
        write(&post.join("evi_C0de_metadata.json"), r#"{"posted_at": "last tuesday"}"#);
        write(&post.join("media/1.jpg"), "x");
        fs::create_dir_all(post.join("comments")).unwrap();

        let result = extract_all(temp.path()).pop().unwrap();
        assert!(matches!(result, Err(MetadataParseError::Timestamp { .. })));
    }

    #[test]
    fn test_post_without_json_values_falls_back_to_name() {
        let temp = TempDir::new().unwrap();
        let post = temp.path().join("evi_IG_POST_20260213_C0de");
        write(&post.join("evi_C0de_metadata.json"), r#"{"username": "", "posted_at": null}"#);
        write(&post.join("media/1.jpg"), "x");
        fs::create_dir_all(post.join("comments")).unwrap();

        let record = extract_all(temp.path()).pop().unwrap().unwrap();
        assert_eq!(record.username, "evi");
        assert_eq!(
            record.posted_at.map(|t| t.date()),
            NaiveDate::from_ymd_opt(2026, 2, 13)
        );
        assert_eq!(record.caption, None);
        assert_eq!(record.engagement, None);
        assert_eq!(record.media, MediaHint::Image);
    }

    #[test]
    fn test_story_with_sidecars() {
        let temp = TempDir::new().unwrap();
        let prefix = "Evi Nator evinator_story_20260213_101500_01_abc123";
        write(&temp.path().join(format!("{prefix}_raw.mp4")), "x");
        write(&temp.path().join(format!("{prefix}_screenshot.png")), "x");
        write(&temp.path().join(format!("{prefix}_caption.txt")), "morning thoughts\n");
        write(
            &temp.path().join(format!("{prefix}_info.json")),
            r#"{"view_count": 40, "taken_at": 1770977700}"#,
        );

        let record = extract_all(temp.path()).pop().unwrap().unwrap();
        assert_eq!(record.variant, ContentVariant::Story);
        assert_eq!(record.username, "evinator");
        assert_eq!(record.display_name.as_deref(), Some("Evi Nator"));
        assert_eq!(record.caption.as_deref(), Some("morning thoughts"));
        assert_eq!(record.media, MediaHint::Video);
        assert_eq!(record.engagement.unwrap().views, Some(40));
        assert!(record.primary_media.unwrap().to_string_lossy().ends_with("_raw.mp4"));
    }

    #[test]
    fn test_story_without_sidecars_has_absent_fields() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("evinator_story_20260213_101500_01_abc123_raw.jpg"),
            "x",
        );

        let record = extract_all(temp.path()).pop().unwrap().unwrap();
        assert_eq!(record.caption, None);
        assert_eq!(record.engagement, None);
        assert_eq!(record.display_name, None);
        assert_eq!(record.media, MediaHint::Image);
        assert_eq!(
            record.posted_at.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2026-02-13 10:15:00"
        );
    }

    #[test]
    fn test_buckets_use_folder_names() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("IG Profile - 2026-02-13 - Evi Nator - @evinator/shot.png"),
            "x",
        );
        write(
            &temp.path().join("IG Reshare - 2026-02-14 - Mo Re - moreshares/1.png"),
            "x",
        );

        let records: Vec<_> = extract_all(temp.path())
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records.len(), 2);

        let profile = records
            .iter()
            .find(|r| r.variant == ContentVariant::Profile)
            .unwrap();
        assert_eq!(profile.username, "evinator");
        assert_eq!(profile.display_name.as_deref(), Some("Evi Nator"));
        assert_eq!(profile.media, MediaHint::Image);

        let reshare = records
            .iter()
            .find(|r| r.variant == ContentVariant::StoryCollection)
            .unwrap();
        assert_eq!(reshare.username, "moreshares");
        assert_eq!(
            reshare.context.tags.get(&LedgerColumn::SheetCategories).map(String::as_str),
            Some("Reshare")
        );
        assert_eq!(reshare.context.resharer.as_ref().unwrap().handle, "moreshares");
    }

    #[test]
    fn test_loose_folder_handle_from_name() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("Misc/Evi profile shots 2026-02-13 - @evinator/a.png"),
            "x",
        );

        let records = extract_all(temp.path());
        assert_eq!(records.len(), 1);
        let profile = records[0].as_ref().unwrap();
        assert_eq!(profile.variant, ContentVariant::Profile);
        assert_eq!(profile.username, "evinator");
        assert_eq!(
            profile.posted_at.map(|d| d.date()),
            NaiveDate::from_ymd_opt(2026, 2, 13)
        );
    }
}
