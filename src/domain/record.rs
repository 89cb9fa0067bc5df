//! Classified, metadata-enriched content records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::schema::LedgerColumn;

/// Content-type variant assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentVariant {
    /// Files of a single story, grouped by shortcode
    Story,

    /// A post folder with metadata, media and comments
    Post,

    /// Profile screenshots
    Profile,

    /// Screenshots of a comment thread
    CommentThread,

    /// A named folder holding several stories without shortcodes
    StoryCollection,
}

impl ContentVariant {
    /// Label written to the ledger's "Post Type" column
    pub fn label(self) -> &'static str {
        match self {
            ContentVariant::Story => "Story",
            ContentVariant::Post => "Post",
            ContentVariant::Profile => "Profile",
            ContentVariant::CommentThread => "Comment Thread",
            ContentVariant::StoryCollection => "Story Collection",
        }
    }
}

impl std::fmt::Display for ContentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// What kind of media the entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaHint {
    Video,
    Image,
    /// Several media items (carousel posts)
    Carousel,
    #[default]
    Unknown,
}

impl MediaHint {
    /// Label written to the ledger's "Media Type" column (empty when unknown)
    pub fn label(self) -> &'static str {
        match self {
            MediaHint::Video => "Video",
            MediaHint::Image => "Image",
            MediaHint::Carousel => "Carousel",
            MediaHint::Unknown => "",
        }
    }

    /// Guess from a file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "mov" | "m4v" => MediaHint::Video,
            "jpg" | "jpeg" | "png" | "webp" | "heic" => MediaHint::Image,
            _ => MediaHint::Unknown,
        }
    }
}

/// Engagement counters. Each counter is independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub views: Option<u64>,
}

impl Engagement {
    /// `None` when no counter is present at all
    pub fn non_empty(self) -> Option<Self> {
        if self.likes.is_none() && self.comments.is_none() && self.views.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

/// Ledger section a record is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Found under a `Stories` folder
    Stories,
    #[default]
    General,
}

/// Account that reshared the content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resharer {
    pub handle: String,
    pub name: Option<String>,
}

/// Facts derived from the folders above an entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathContext {
    pub section: Section,

    /// Tag columns filled from category folders
    pub tags: BTreeMap<LedgerColumn, String>,

    pub resharer: Option<Resharer>,
}

/// A classified and metadata-enriched candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub identifier: Identifier,

    pub variant: ContentVariant,

    /// Account handle; always present (derived from names when no metadata exists)
    pub username: String,

    pub display_name: Option<String>,

    /// Post or capture time (midnight when only a date is known)
    pub posted_at: Option<NaiveDateTime>,

    pub engagement: Option<Engagement>,

    pub caption: Option<String>,

    pub media: MediaHint,

    #[serde(default)]
    pub collaborators: Vec<String>,

    /// Folder name marked the entry as paired content
    #[serde(default)]
    pub paired: bool,

    /// Candidate root the record was built from
    pub source: PathBuf,

    /// Primary media file inside the candidate, if one was identified
    pub primary_media: Option<PathBuf>,

    /// Destination directory, set once the mover has planned the entry
    pub destination: Option<PathBuf>,

    /// Destination of the primary media file, for the ledger's link column
    pub db_link: Option<PathBuf>,

    #[serde(default)]
    pub context: PathContext,
}

impl ContentRecord {
    /// Create a record with only the required fields populated
    pub fn new(
        identifier: Identifier,
        variant: ContentVariant,
        username: impl Into<String>,
        source: PathBuf,
    ) -> Self {
        Self {
            identifier,
            variant,
            username: username.into(),
            display_name: None,
            posted_at: None,
            engagement: None,
            caption: None,
            media: MediaHint::Unknown,
            collaborators: Vec::new(),
            paired: false,
            source,
            primary_media: None,
            destination: None,
            db_link: None,
            context: PathContext::default(),
        }
    }
}

/// Collapse empty or whitespace-only strings to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_labels() {
        assert_eq!(ContentVariant::CommentThread.label(), "Comment Thread");
        assert_eq!(ContentVariant::StoryCollection.to_string(), "Story Collection");
    }

    #[test]
    fn test_media_hint_from_extension() {
        assert_eq!(MediaHint::from_extension("MP4"), MediaHint::Video);
        assert_eq!(MediaHint::from_extension("jpeg"), MediaHint::Image);
        assert_eq!(MediaHint::from_extension("txt"), MediaHint::Unknown);
    }

    #[test]
    fn test_engagement_non_empty() {
        assert_eq!(Engagement::default().non_empty(), None);
        let e = Engagement { likes: Some(3), ..Default::default() };
        assert_eq!(e.non_empty(), Some(e));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" Evi ".to_string())), Some("Evi".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
