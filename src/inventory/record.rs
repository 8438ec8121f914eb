use std::collections::BTreeSet;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::analysis::VariantGroup;
use crate::usage::UsageInfo;
use super::size::parse_size;

/// One row of `ollama list` output, before any classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedModel {
    /// Full model name in `base:tag` form
    pub name: String,
    /// Short content digest shown by the manager
    pub id: String,
    /// Size as printed, value and unit (e.g. "4.7 GB")
    pub size: String,
    /// Relative modification time as printed (e.g. "3 days ago")
    pub modified: String,
}

/// Coarse recency bucket derived from the relative modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeCategory {
    Recent,
    Moderate,
    Old,
    Unknown,
}

impl fmt::Display for AgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgeCategory::Recent => "Recent",
            AgeCategory::Moderate => "Moderate",
            AgeCategory::Old => "Old",
            AgeCategory::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Capability tag guessed from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    Text,
    Vision,
    Code,
    Embed,
    Tools,
    Reasoning,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Capability::Text => "Text",
            Capability::Vision => "Vision",
            Capability::Code => "Code",
            Capability::Embed => "Embed",
            Capability::Tools => "Tools",
            Capability::Reasoning => "Reasoning",
        };
        f.write_str(label)
    }
}

/// A fully classified model as shown by the front-ends.
///
/// Records are rebuilt from scratch on every reload. Only the star and
/// deletion-queue flags are re-synced in place when the session changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub id: String,
    pub size: String,
    pub modified: String,
    pub capabilities: BTreeSet<Capability>,
    pub age: AgeCategory,
    pub is_starred: bool,
    pub is_queued_for_deletion: bool,
    pub is_liberated: bool,
    pub is_duplicate: bool,
    pub is_special_variant: bool,
    pub variant_info: Option<VariantGroup>,
    pub usage: Option<UsageInfo>,
}

impl ModelRecord {
    /// Size in bytes, if the size column could be parsed.
    pub fn size_bytes(&self) -> Option<f64> {
        parse_size(&self.size)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Number of chats recorded for this model, zero when never used.
    pub fn usage_count(&self) -> u64 {
        self.usage.as_ref().map_or(0, |usage| usage.count)
    }

    /// Capabilities joined for display, e.g. "Text, Code".
    pub fn capability_labels(&self) -> String {
        self.capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
