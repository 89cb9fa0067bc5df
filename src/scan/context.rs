//! Facts implied by the folders above an entry.
//!
//! Download folders are organised as `Stories/Batch N/{Category}/...`,
//! `Additional/MO/{type}/{value}/...`, `Categories/{value}/...` and
//! `Reshares/IG Reshare - .../...`. The ancestors of an entry therefore
//! decide its ledger section and pre-fill some tag columns.

use std::path::Path;

use crate::domain::{LedgerColumn, PathContext, Resharer, Section};

use super::patterns::parse_reshare_folder;

const STORIES_SECTION: &str = "Stories";
const MO_FOLDER: &str = "MO";
const CATEGORIES_FOLDER: &str = "Categories";
const RESHARE_CATEGORY: &str = "Reshare";

/// Derive the context of an entry from its ancestor directories,
/// given relative to the scan root.
pub fn derive(ancestors: &Path) -> PathContext {
    let parts: Vec<&str> = ancestors
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    let mut context = PathContext::default();

    if parts.iter().any(|p| *p == STORIES_SECTION) {
        context.section = Section::Stories;
    }

    for (i, part) in parts.iter().enumerate() {
        if let Some(column) = LedgerColumn::for_category(part) {
            let value = parts.get(i + 1).copied().unwrap_or(*part);
            context.tags.entry(column).or_insert_with(|| value.to_string());
        }

        if *part == MO_FOLDER {
            if let (Some(kind), Some(value)) = (parts.get(i + 1), parts.get(i + 2)) {
                if let Some(column) = LedgerColumn::for_mo_type(kind) {
                    context.tags.insert(column, value.to_string());
                }
            }
        }

        if *part == CATEGORIES_FOLDER {
            if let Some(value) = parts.get(i + 1) {
                context.tags.insert(LedgerColumn::MoPw, value.to_string());
            }
        }

        if let Some(reshare) = parse_reshare_folder(part) {
            context.resharer = Some(Resharer {
                handle: reshare.handle,
                name: reshare.display_name,
            });
            context
                .tags
                .insert(LedgerColumn::SheetCategories, RESHARE_CATEGORY.to_string());
        }
    }

    context
}
