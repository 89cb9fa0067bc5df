//! Ledger column schema and row rendering.
//!
//! The ledger is a spreadsheet; every archived record becomes one row whose
//! cells follow [`LedgerColumn::ALL`] exactly. New columns are only ever
//! appended so that older sheets can be healed by rewriting the header row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::ContentRecord;

/// One column of the ledger, in sheet order (A, B, C, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerColumn {
    Timestamp,
    Shortcode,
    RealName,
    Username,
    PostType,
    Downloader,
    PostDate,
    Collaborators,
    ManualNotes,
    DbLink,
    PairedContent,
    StoriesReshareLinks,
    PrimaryBeginningTags,
    SecondaryBeginningTags,
    GeneralTriggers,
    SheetCategories,
    Books,
    Conditions,
    EmotionalSupport,
    Fear,
    Food,
    HealingStories,
    HealingTools,
    HealingToolsMore,
    History,
    Miscellaneous,
    MmScience,
    Other,
    PwTrends,
    Resources,
    Supporting,
    MoPublication,
    MoPw,
    MoRpt,
    MoSi,
    MoTs,
    MoWts,
    Caption,
    Likes,
    Comments,
    MediaType,
}

impl LedgerColumn {
    /// Every column in sheet order
    pub const ALL: [LedgerColumn; 41] = [
        LedgerColumn::Timestamp,
        LedgerColumn::Shortcode,
        LedgerColumn::RealName,
        LedgerColumn::Username,
        LedgerColumn::PostType,
        LedgerColumn::Downloader,
        LedgerColumn::PostDate,
        LedgerColumn::Collaborators,
        LedgerColumn::ManualNotes,
        LedgerColumn::DbLink,
        LedgerColumn::PairedContent,
        LedgerColumn::StoriesReshareLinks,
        LedgerColumn::PrimaryBeginningTags,
        LedgerColumn::SecondaryBeginningTags,
        LedgerColumn::GeneralTriggers,
        LedgerColumn::SheetCategories,
        LedgerColumn::Books,
        LedgerColumn::Conditions,
        LedgerColumn::EmotionalSupport,
        LedgerColumn::Fear,
        LedgerColumn::Food,
        LedgerColumn::HealingStories,
        LedgerColumn::HealingTools,
        LedgerColumn::HealingToolsMore,
        LedgerColumn::History,
        LedgerColumn::Miscellaneous,
        LedgerColumn::MmScience,
        LedgerColumn::Other,
        LedgerColumn::PwTrends,
        LedgerColumn::Resources,
        LedgerColumn::Supporting,
        LedgerColumn::MoPublication,
        LedgerColumn::MoPw,
        LedgerColumn::MoRpt,
        LedgerColumn::MoSi,
        LedgerColumn::MoTs,
        LedgerColumn::MoWts,
        LedgerColumn::Caption,
        LedgerColumn::Likes,
        LedgerColumn::Comments,
        LedgerColumn::MediaType,
    ];

    /// Header cell text
    pub fn header(self) -> &'static str {
        match self {
            LedgerColumn::Timestamp => "Timestamp",
            LedgerColumn::Shortcode => "Shortcode",
            LedgerColumn::RealName => "Real Name",
            LedgerColumn::Username => "Username",
            LedgerColumn::PostType => "Post Type",
            LedgerColumn::Downloader => "Downloader",
            LedgerColumn::PostDate => "Post Date",
            LedgerColumn::Collaborators => "Collaborators",
            LedgerColumn::ManualNotes => "Manual Notes",
            LedgerColumn::DbLink => "DB Link",
            LedgerColumn::PairedContent => "Paired Content",
            LedgerColumn::StoriesReshareLinks => "Stories Reshare Links",
            LedgerColumn::PrimaryBeginningTags => "Primary Beginning Tags",
            LedgerColumn::SecondaryBeginningTags => "Secondary Beginning Tags",
            LedgerColumn::GeneralTriggers => "General Triggers",
            LedgerColumn::SheetCategories => "Sheet Categories",
            LedgerColumn::Books => "Books",
            LedgerColumn::Conditions => "Conditions",
            LedgerColumn::EmotionalSupport => "Emotional Support",
            LedgerColumn::Fear => "Fear",
            LedgerColumn::Food => "Food",
            LedgerColumn::HealingStories => "Healing Stories",
            LedgerColumn::HealingTools => "Healing Tools",
            LedgerColumn::HealingToolsMore => "Healing Tools More",
            LedgerColumn::History => "History",
            LedgerColumn::Miscellaneous => "Miscellaneous",
            LedgerColumn::MmScience => "MM Science",
            LedgerColumn::Other => "Other",
            LedgerColumn::PwTrends => "PW Trends",
            LedgerColumn::Resources => "Resources",
            LedgerColumn::Supporting => "Supporting",
            LedgerColumn::MoPublication => "MO-Publication",
            LedgerColumn::MoPw => "MO-PW",
            LedgerColumn::MoRpt => "MO-RPT",
            LedgerColumn::MoSi => "MO-SI",
            LedgerColumn::MoTs => "MO-TS",
            LedgerColumn::MoWts => "MO-WTS",
            LedgerColumn::Caption => "Caption",
            LedgerColumn::Likes => "Likes",
            LedgerColumn::Comments => "Comments",
            LedgerColumn::MediaType => "Media Type",
        }
    }

    /// Category column for a story category folder name ("Healing Tools" -> HealingTools)
    pub fn for_category(folder: &str) -> Option<Self> {
        let column = match folder {
            "Books" => LedgerColumn::Books,
            "Conditions" => LedgerColumn::Conditions,
            "Emotional Support" => LedgerColumn::EmotionalSupport,
            "Fear" => LedgerColumn::Fear,
            "Food" => LedgerColumn::Food,
            "Healing Stories" => LedgerColumn::HealingStories,
            "Healing Tools" => LedgerColumn::HealingTools,
            "Healing Tools More" => LedgerColumn::HealingToolsMore,
            "History" => LedgerColumn::History,
            "Miscellaneous" => LedgerColumn::Miscellaneous,
            "MM Science" => LedgerColumn::MmScience,
            "Other" => LedgerColumn::Other,
            "PW Trends" => LedgerColumn::PwTrends,
            "Resources" => LedgerColumn::Resources,
            "Supporting" => LedgerColumn::Supporting,
            _ => return None,
        };
        Some(column)
    }

    /// MO column for an `MO/{type}` folder name
    pub fn for_mo_type(folder: &str) -> Option<Self> {
        let column = match folder {
            "PW" => LedgerColumn::MoPw,
            "RPT" => LedgerColumn::MoRpt,
            "SI" => LedgerColumn::MoSi,
            "TS" => LedgerColumn::MoTs,
            "WTS" => LedgerColumn::MoWts,
            _ => return None,
        };
        Some(column)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// The header row every ledger partition is expected to carry
pub fn ledger_headers() -> Vec<String> {
    LedgerColumn::ALL
        .iter()
        .map(|c| c.header().to_string())
        .collect()
}

/// A record rendered as ledger cells, in column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRow(Vec<String>);

impl LogRow {
    /// Render a record. Absent optional fields become empty cells.
    pub fn from_record(record: &ContentRecord, archived_on: NaiveDate, downloader: &str) -> Self {
        let mut cells = vec![String::new(); LedgerColumn::ALL.len()];
        let mut set = |column: LedgerColumn, value: String| cells[column.index()] = value;

        set(LedgerColumn::Timestamp, archived_on.format("%Y-%m-%d").to_string());
        set(LedgerColumn::Shortcode, record.identifier.to_string());
        set(LedgerColumn::RealName, record.display_name.clone().unwrap_or_default());
        set(LedgerColumn::Username, record.username.clone());
        set(LedgerColumn::PostType, record.variant.label().to_string());
        set(LedgerColumn::Downloader, downloader.to_string());
        set(
            LedgerColumn::PostDate,
            record
                .posted_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
        set(LedgerColumn::Collaborators, record.collaborators.join(", "));
        set(
            LedgerColumn::DbLink,
            record
                .db_link
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
        if record.paired {
            set(LedgerColumn::PairedContent, "Yes".to_string());
        }

        for (column, value) in &record.context.tags {
            set(*column, value.clone());
        }

        set(LedgerColumn::Caption, record.caption.clone().unwrap_or_default());
        if let Some(engagement) = &record.engagement {
            let count = |n: Option<u64>| n.map(|n| n.to_string()).unwrap_or_default();
            set(LedgerColumn::Likes, count(engagement.likes));
            set(LedgerColumn::Comments, count(engagement.comments));
        }
        set(LedgerColumn::MediaType, record.media.label().to_string());

        Self(cells)
    }

    /// Cell value for a column
    pub fn get(&self, column: LedgerColumn) -> &str {
        &self.0[column.index()]
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn into_cells(self) -> Vec<String> {
        self.0
    }
}
