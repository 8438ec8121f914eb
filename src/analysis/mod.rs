//! # Analysis Module
//!
//! Everything derived from model names and the manager's columns:
//! capability and age classification, family/variant detection, and the
//! search/filter/sort evaluation used by the front-ends.

pub mod classify;
pub mod filter;
pub mod variants;

pub use classify::{capabilities, classify_age, is_liberated, relative_age_secs};
pub use filter::{ModelFilter, ModelQuery, SortKey};
pub use variants::{detect_variants, is_special_variant, VariantGroup, VariantReport};

use crate::inventory::{ListedModel, ModelRecord};
use crate::usage::UsageInfo;

/// Turns raw manager rows into classified records.
///
/// Duplicate detection runs over the whole list after every row is parsed,
/// so the result does not depend on row order. Star and queue flags are left
/// unset; the session applies them.
pub fn classify_models<F>(listed: Vec<ListedModel>, mut usage_for: F) -> Vec<ModelRecord>
where
    F: FnMut(&str) -> Option<UsageInfo>,
{
    let report = detect_variants(listed.iter().map(|model| model.name.as_str()));

    listed
        .into_iter()
        .map(|model| {
            let usage = usage_for(&model.name);
            ModelRecord {
                capabilities: capabilities(&model.name),
                age: classify_age(&model.modified),
                is_starred: false,
                is_queued_for_deletion: false,
                is_liberated: is_liberated(&model.name),
                is_duplicate: report.is_duplicate(&model.name),
                is_special_variant: is_special_variant(&model.name),
                variant_info: report.family_of(&model.name).cloned(),
                usage,
                name: model.name,
                id: model.id,
                size: model.size,
                modified: model.modified,
            }
        })
        .collect()
}
