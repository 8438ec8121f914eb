use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// Tag fragments that make a model a meaningful variant rather than a
/// duplicate of its family.
pub const SPECIAL_SUFFIXES: &[&str] = &[
    "instruct", "chat", "code", "vision", "embed", "text",
    "a3b", "dpo", "ift", "sft", "rlhf", "tool", "function",
    "reasoning", "uncensored", "abliterated", "art", "base",
];

/// Separator between the family name and the tag.
const TAG_SEPARATOR: char = ':';

/// Summary of one model family with at least two members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantGroup {
    /// Lower-cased family name
    pub base_name: String,
    /// Members whose tag carries a special suffix, sorted
    pub special_variants: Vec<String>,
    /// Members without a special suffix, sorted; all but the first are duplicates
    pub regular_duplicates: Vec<String>,
    /// Number of members in the family
    pub total_count: usize,
}

/// Result of running duplicate detection over a whole inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantReport {
    pub duplicates: BTreeSet<String>,
    pub families: BTreeMap<String, VariantGroup>,
}

impl VariantReport {
    pub fn is_duplicate(&self, name: &str) -> bool {
        self.duplicates.contains(name)
    }

    /// Family descriptor for `name`, if its family was reported.
    pub fn family_of(&self, name: &str) -> Option<&VariantGroup> {
        self.families.get(&base_name(name))
    }
}

/// Lower-cased text before the first `:`, or the whole name.
pub fn base_name(name: &str) -> String {
    match name.split_once(TAG_SEPARATOR) {
        Some((base, _)) => base.to_lowercase(),
        None => name.to_lowercase(),
    }
}

/// Lower-cased text after the first `:`, empty when there is no tag.
pub fn tag(name: &str) -> String {
    name.split_once(TAG_SEPARATOR)
        .map(|(_, tag)| tag.to_lowercase())
        .unwrap_or_default()
}

/// Whether the tag contains any special suffix.
pub fn is_special_variant(name: &str) -> bool {
    let tag = tag(name);
    !tag.is_empty() && SPECIAL_SUFFIXES.iter().any(|suffix| tag.contains(suffix))
}

/// Groups names into families and flags duplicates.
///
/// In every family with two or more regular members, the regular members are
/// sorted and all but the lexicographically first are duplicates. Special
/// variants are never duplicates.
pub fn detect_variants<'a>(names: impl IntoIterator<Item = &'a str>) -> VariantReport {
    let mut families: BTreeMap<String, Vec<&'a str>> = BTreeMap::new();
    for name in names {
        families.entry(base_name(name)).or_default().push(name);
    }

    let mut report = VariantReport::default();
    for (base, mut members) in families {
        if members.len() < 2 {
            continue;
        }
        members.sort_unstable();

        let (special, regular): (Vec<&str>, Vec<&str>) =
            members.iter().copied().partition(|name| is_special_variant(name));

        if regular.len() > 1 {
            report
                .duplicates
                .extend(regular[1..].iter().map(|name| name.to_string()));
        }

        if !special.is_empty() || regular.len() > 1 {
            report.families.insert(
                base.clone(),
                VariantGroup {
                    base_name: base,
                    special_variants: special.into_iter().map(str::to_string).collect(),
                    regular_duplicates: regular.into_iter().map(str::to_string).collect(),
                    total_count: members.len(),
                },
            );
        }
    }

    report
}
