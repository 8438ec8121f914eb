use std::cmp::Ordering;
use std::fmt;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::inventory::size::size_in_gb;
use crate::inventory::{AgeCategory, Capability, ModelRecord};
use super::classify::relative_age_secs;

/// Sizes above this many gigabytes count as large.
pub const LARGE_MODEL_GB: f64 = 10.0;
/// Sizes below this many gigabytes count as small.
pub const SMALL_MODEL_GB: f64 = 5.0;
/// Chat count above which a model counts as frequently used.
pub const FREQUENT_USE_CHATS: u64 = 10;
/// Window for "recent activity" in the chat application.
pub const RECENT_ACTIVITY_DAYS: i64 = 7;

/// Category filter offered by both front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFilter {
    #[default]
    All,
    /// Modified within two weeks
    Recent,
    /// Modified two to four weeks ago
    Moderate,
    /// Modified more than a month ago
    Old,
    Vision,
    Text,
    /// Larger than 10 GB
    Large,
    /// Smaller than 5 GB
    Small,
    Starred,
    Liberated,
    Queued,
    Duplicates,
    Variants,
    /// Member of a family with two or more models
    Families,
    /// Used at least once in Open WebUI
    Used,
    /// Never used in Open WebUI
    NeverUsed,
    /// More than 10 Open WebUI chats
    Frequent,
    /// Open WebUI activity within the last 7 days
    Active,
}

impl ModelFilter {
    /// Whether `record` passes the filter at time `now`.
    pub fn matches(self, record: &ModelRecord, now: DateTime<Utc>) -> bool {
        match self {
            ModelFilter::All => true,
            ModelFilter::Recent => record.age == AgeCategory::Recent,
            ModelFilter::Moderate => record.age == AgeCategory::Moderate,
            ModelFilter::Old => record.age == AgeCategory::Old,
            ModelFilter::Vision => record.has_capability(Capability::Vision),
            ModelFilter::Text => record.has_capability(Capability::Text),
            ModelFilter::Large => size_in_gb(&record.size).is_some_and(|gb| gb > LARGE_MODEL_GB),
            ModelFilter::Small => size_in_gb(&record.size).is_some_and(|gb| gb < SMALL_MODEL_GB),
            ModelFilter::Starred => record.is_starred,
            ModelFilter::Liberated => record.is_liberated,
            ModelFilter::Queued => record.is_queued_for_deletion,
            ModelFilter::Duplicates => record.is_duplicate,
            ModelFilter::Variants => record.is_special_variant,
            ModelFilter::Families => record.variant_info.is_some(),
            ModelFilter::Used => record.usage_count() > 0,
            ModelFilter::NeverUsed => record.usage_count() == 0,
            ModelFilter::Frequent => record.usage_count() > FREQUENT_USE_CHATS,
            ModelFilter::Active => record
                .usage
                .as_ref()
                .and_then(|usage| usage.last_used_at())
                .is_some_and(|last| now - last <= Duration::days(RECENT_ACTIVITY_DAYS)),
        }
    }
}

impl fmt::Display for ModelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Column to sort the model list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Modified,
}

/// Search, filter and sort applied to the in-memory record list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelQuery {
    pub search: Option<String>,
    pub filter: ModelFilter,
    pub sort: SortKey,
    pub reverse: bool,
}

impl ModelQuery {
    /// Case-insensitive substring search on the name.
    fn matches_search(&self, record: &ModelRecord) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => record.name.to_lowercase().contains(&term.to_lowercase()),
        }
    }

    /// Records passing search and filter, in the requested order.
    pub fn apply<'a>(&self, records: &'a [ModelRecord], now: DateTime<Utc>) -> Vec<&'a ModelRecord> {
        let mut selected: Vec<&ModelRecord> = records
            .iter()
            .filter(|record| self.matches_search(record))
            .filter(|record| self.filter.matches(record, now))
            .collect();

        selected.sort_by(|a, b| compare(self.sort, a, b));
        if self.reverse {
            selected.reverse();
        }
        selected
    }
}

/// Unparseable sizes and ages sort last.
fn compare_optional<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(key: SortKey, a: &ModelRecord, b: &ModelRecord) -> Ordering {
    let primary = match key {
        SortKey::Name => Ordering::Equal,
        SortKey::Size => compare_optional(a.size_bytes(), b.size_bytes()),
        SortKey::Modified => {
            compare_optional(relative_age_secs(&a.modified), relative_age_secs(&b.modified))
        }
    };
    primary.then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::usage::UsageInfo;

    fn record(name: &str, size: &str, modified: &str) -> ModelRecord {
        ModelRecord {
            name: name.to_string(),
            id: "0123456789ab".to_string(),
            size: size.to_string(),
            modified: modified.to_string(),
            capabilities: crate::analysis::classify::capabilities(name),
            age: crate::analysis::classify::classify_age(modified),
            is_starred: false,
            is_queued_for_deletion: false,
            is_liberated: crate::analysis::classify::is_liberated(name),
            is_duplicate: false,
            is_special_variant: false,
            variant_info: None,
            usage: None,
        }
    }

    fn usage(count: u64, last_used: Option<i64>) -> UsageInfo {
        UsageInfo {
            count,
            last_used,
            first_used: last_used,
            total_tokens: 0,
            original_name: "x".to_string(),
        }
    }

    fn names(records: Vec<&ModelRecord>) -> Vec<&str> {
        records.into_iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let records = vec![record("Llama3:8b", "4.7 GB", "1 day ago"), record("phi3:mini", "2.2 GB", "1 day ago")];
        let query = ModelQuery { search: Some("LLAMA".to_string()), ..Default::default() };
        assert_eq!(names(query.apply(&records, Utc::now())), vec!["Llama3:8b"]);
    }

    #[test]
    fn test_size_filters_use_units() {
        let records = vec![
            record("big:70b", "39 GB", "1 day ago"),
            record("tiny:1b", "700 MB", "1 day ago"),
            record("mid:13b", "7.4 GB", "1 day ago"),
        ];
        let now = Utc::now();
        let large = ModelQuery { filter: ModelFilter::Large, ..Default::default() };
        let small = ModelQuery { filter: ModelFilter::Small, ..Default::default() };
        assert_eq!(names(large.apply(&records, now)), vec!["big:70b"]);
        assert_eq!(names(small.apply(&records, now)), vec!["tiny:1b"]);
    }

    #[test]
    fn test_age_and_flag_filters() {
        let mut records = vec![
            record("a:1", "1 GB", "3 days ago"),
            record("b:1", "1 GB", "3 weeks ago"),
            record("c:1", "1 GB", "2 months ago"),
        ];
        records[1].is_starred = true;
        records[2].is_queued_for_deletion = true;
        let now = Utc::now();

        let check = |filter: ModelFilter| {
            names(ModelQuery { filter, ..Default::default() }.apply(&records, now))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(check(ModelFilter::Recent), vec!["a:1"]);
        assert_eq!(check(ModelFilter::Moderate), vec!["b:1"]);
        assert_eq!(check(ModelFilter::Old), vec!["c:1"]);
        assert_eq!(check(ModelFilter::Starred), vec!["b:1"]);
        assert_eq!(check(ModelFilter::Queued), vec!["c:1"]);
        assert_eq!(check(ModelFilter::All).len(), 3);
    }

    #[test]
    fn test_usage_filters() {
        let now = Utc::now();
        let mut records = vec![
            record("never:1", "1 GB", "1 day ago"),
            record("busy:1", "1 GB", "1 day ago"),
            record("stale:1", "1 GB", "1 day ago"),
        ];
        records[1].usage = Some(usage(25, Some((now - Duration::days(1)).timestamp())));
        records[2].usage = Some(usage(3, Some((now - Duration::days(30)).timestamp())));

        let run = |filter| names(ModelQuery { filter, ..Default::default() }.apply(&records, now)).len();
        assert_eq!(run(ModelFilter::Used), 2);
        assert_eq!(run(ModelFilter::NeverUsed), 1);
        assert_eq!(run(ModelFilter::Frequent), 1);
        assert_eq!(run(ModelFilter::Active), 1);
    }

    #[test]
    fn test_sorting() {
        let records = vec![
            record("b:1", "2 GB", "2 weeks ago"),
            record("a:1", "900 MB", "3 hours ago"),
            record("c:1", "unknown", "1 month ago"),
        ];
        let now = Utc::now();

        let by_size = ModelQuery { sort: SortKey::Size, ..Default::default() };
        assert_eq!(names(by_size.apply(&records, now)), vec!["a:1", "b:1", "c:1"]);

        let newest_first = ModelQuery { sort: SortKey::Modified, ..Default::default() };
        assert_eq!(names(newest_first.apply(&records, now)), vec!["a:1", "b:1", "c:1"]);

        let by_name_desc = ModelQuery { reverse: true, ..Default::default() };
        assert_eq!(names(by_name_desc.apply(&records, now)), vec!["c:1", "b:1", "a:1"]);
    }

    #[test]
    fn test_vision_filter() {
        let records = vec![record("llava:7b", "4 GB", "1 day ago"), record("mistral:7b", "4 GB", "1 day ago")];
        let query = ModelQuery { filter: ModelFilter::Vision, ..Default::default() };
        assert_eq!(names(query.apply(&records, Utc::now())), vec!["llava:7b"]);
        assert!(records[0].capabilities.is_superset(&BTreeSet::from([Capability::Text])));
    }

    #[test]
    fn test_filter_display_names() {
        assert_eq!(ModelFilter::NeverUsed.to_string(), "never-used");
        assert_eq!(ModelFilter::All.to_string(), "all");
    }
}
