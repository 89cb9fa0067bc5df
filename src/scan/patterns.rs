//! File and folder naming conventions of downloaded content.
//!
//! Every recognised name is parsed into a small struct; callers never touch
//! the raw captures.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

// {prefix}_story_{YYYYMMDD}_{HHMMSS}_{NN}_{identifier}_{suffix}.{ext}
static STORY_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(.+)_story_(\d{8})_(\d{6})_(\d{2})_(.+)_(raw|screencapture|screenshot|caption|info)\.((?i:mp4|jpe?g|png|txt|json))$",
    )
    .unwrap()
});

// {username}_IG_POST_{YYYYMMDD}_{identifier}[_collab_...][ - PAIRED]
static POST_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_IG_POST_(\d{8})_(.+?)(\s+-\s+PAIRED)?$").unwrap()
});

static COMMENT_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_IG_POST_(\d{8})_(.+?)_COMMENT_(\d+)_(\d{8})_([\w.]+)\.(?i:jpe?g|png)$")
        .unwrap()
});

static PROFILE_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IG Profile - (\d{4}-\d{2}-\d{2}) - (.+?) - @([\w.]+)$").unwrap()
});

static PROFILE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w.]+)_profile_(\d{8})\.(?i:png|jpe?g)$").unwrap()
});

static COMMENT_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IG Regular Comment\b.*?(\d{4}-\d{2}-\d{2}).*?- @([\w.]+)(\s+-\s+PAIRED)?$")
        .unwrap()
});

static NAMED_STORY_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IG Stories - (\d{4}-\d{2}-\d{2}) - (.+?) - @?([\w.]+)$").unwrap()
});

static STORIES_TXT_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IG Stories TXT\b.*?(\d{4}-\d{2}-\d{2}).*?@([\w.]+)$").unwrap()
});

static RESHARE_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^IG Reshare - (\d{4}-\d{2}-\d{2}) - (.+?) - @?([\w.]+)$").unwrap()
});

static LOOSE_HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([\w.]+)").unwrap());

static LOOSE_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

const COLLAB_MARKER: &str = "_collab_";

/// Which of the three files of a story this is (plus sidecars)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorySuffix {
    Raw,
    ScreenCapture,
    Screenshot,
    Caption,
    Info,
}

impl StorySuffix {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(StorySuffix::Raw),
            "screencapture" => Some(StorySuffix::ScreenCapture),
            "screenshot" => Some(StorySuffix::Screenshot),
            "caption" => Some(StorySuffix::Caption),
            "info" => Some(StorySuffix::Info),
            _ => None,
        }
    }
}

/// A parsed story file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryFile {
    pub username: String,
    pub display_name: Option<String>,
    /// YYYYMMDD
    pub date: String,
    /// HHMMSS
    pub time: String,
    pub seq: String,
    pub identifier: String,
    pub suffix: StorySuffix,
    pub extension: String,
}

/// Parse a story file name.
///
/// The prefix is either `username` or `Display Name username`; the username
/// is always the last space-separated token.
pub fn parse_story_file(name: &str) -> Option<StoryFile> {
    let caps = STORY_FILE.captures(name)?;
    let prefix = caps.get(1)?.as_str();
    let (display_name, username) = match prefix.rsplit_once(' ') {
        Some((display, user)) => (Some(display.trim().to_string()), user.to_string()),
        None => (None, prefix.to_string()),
    };

    Some(StoryFile {
        username,
        display_name: display_name.filter(|d| !d.is_empty()),
        date: caps[2].to_string(),
        time: caps[3].to_string(),
        seq: caps[4].to_string(),
        identifier: caps[5].to_string(),
        suffix: StorySuffix::parse(&caps[6])?,
        extension: caps[7].to_ascii_lowercase(),
    })
}

pub fn is_story_file(name: &str) -> bool {
    STORY_FILE.is_match(name)
}

/// A parsed post folder name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFolder {
    pub username: String,
    /// YYYYMMDD
    pub date: String,
    pub identifier: String,
    pub collaborators: Vec<String>,
    pub paired: bool,
}

pub fn parse_post_folder(name: &str) -> Option<PostFolder> {
    let caps = POST_FOLDER.captures(name)?;
    let code = &caps[3];
    let (identifier, collaborators) = match code.split_once(COLLAB_MARKER) {
        Some((id, rest)) => (
            id.to_string(),
            rest.split(COLLAB_MARKER)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => (code.to_string(), Vec::new()),
    };

    Some(PostFolder {
        username: caps[1].to_string(),
        date: caps[2].to_string(),
        identifier,
        collaborators,
        paired: caps.get(4).is_some(),
    })
}

pub fn is_post_folder(name: &str) -> bool {
    POST_FOLDER.is_match(name)
}

pub fn is_comment_file(name: &str) -> bool {
    COMMENT_FILE.is_match(name)
}

/// A name-derived bucket: profile, comment thread or named story folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBucket {
    pub kind: BucketKind,
    /// YYYY-MM-DD
    pub date: String,
    pub display_name: Option<String>,
    pub handle: String,
    pub paired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    ProfileFolder,
    ProfileFile,
    CommentThread,
    NamedStories,
    StoriesText,
    Reshare,
}

impl BucketKind {
    /// Named groupings of several stories
    pub fn is_story_grouping(self) -> bool {
        matches!(
            self,
            BucketKind::NamedStories | BucketKind::StoriesText | BucketKind::Reshare
        )
    }
}

/// Parse a bucket folder name (profile, comment thread, story grouping)
pub fn parse_bucket_folder(name: &str) -> Option<NamedBucket> {
    if let Some(caps) = PROFILE_FOLDER.captures(name) {
        return Some(NamedBucket {
            kind: BucketKind::ProfileFolder,
            date: caps[1].to_string(),
            display_name: Some(caps[2].to_string()),
            handle: caps[3].to_string(),
            paired: false,
        });
    }
    if let Some(caps) = COMMENT_FOLDER.captures(name) {
        return Some(NamedBucket {
            kind: BucketKind::CommentThread,
            date: caps[1].to_string(),
            display_name: None,
            handle: caps[2].to_string(),
            paired: caps.get(3).is_some(),
        });
    }
    if let Some(caps) = STORIES_TXT_FOLDER.captures(name) {
        return Some(NamedBucket {
            kind: BucketKind::StoriesText,
            date: caps[1].to_string(),
            display_name: None,
            handle: caps[2].to_string(),
            paired: false,
        });
    }
    if let Some(caps) = NAMED_STORY_FOLDER.captures(name) {
        return Some(NamedBucket {
            kind: BucketKind::NamedStories,
            date: caps[1].to_string(),
            display_name: Some(caps[2].to_string()),
            handle: caps[3].to_string(),
            paired: false,
        });
    }
    if let Some(caps) = RESHARE_FOLDER.captures(name) {
        return Some(NamedBucket {
            kind: BucketKind::Reshare,
            date: caps[1].to_string(),
            display_name: Some(caps[2].to_string()),
            handle: caps[3].to_string(),
            paired: false,
        });
    }
    None
}

/// Parse a profile screenshot file name
pub fn parse_profile_file(name: &str) -> Option<NamedBucket> {
    let caps = PROFILE_FILE.captures(name)?;
    Some(NamedBucket {
        kind: BucketKind::ProfileFile,
        date: format_date(&caps[2]),
        display_name: None,
        handle: caps[1].to_string(),
        paired: false,
    })
}

/// Parse a reshare folder name
pub fn parse_reshare_folder(name: &str) -> Option<NamedBucket> {
    parse_bucket_folder(name).filter(|b| b.kind == BucketKind::Reshare)
}

/// First `@handle` anywhere in a free-form name
pub fn find_handle(name: &str) -> Option<String> {
    LOOSE_HANDLE.captures(name).map(|c| c[1].to_string())
}

/// Last valid YYYY-MM-DD anywhere in a free-form name
pub fn find_date(name: &str) -> Option<NaiveDate> {
    LOOSE_DATE
        .find_iter(name)
        .filter_map(|m| parse_date(m.as_str()))
        .last()
}

/// Convert YYYYMMDD to YYYY-MM-DD; other inputs pass through unchanged
pub fn format_date(date: &str) -> String {
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..8])
    } else {
        date.to_string()
    }
}

/// Parse YYYYMMDD or YYYY-MM-DD
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format_date(date), "%Y-%m-%d").ok()
}
