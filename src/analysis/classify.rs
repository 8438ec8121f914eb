use std::collections::BTreeSet;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::inventory::{AgeCategory, Capability};

/// Keywords that mark a model as an uncensored ("liberated") variant.
pub const LIBERATION_KEYWORDS: &[&str] = &[
    "uncensored", "abliterated", "art", "unfiltered", "raw",
    "nsfw", "freedom", "libre", "unleashed", "unlimited",
    "dpo", "rogue", "wild", "rebel", "free",
];

const VISION_KEYWORDS: &[&str] = &["vision", "vl", "visual", "llava", "clip"];
const CODE_KEYWORDS: &[&str] = &["code", "coder", "coding"];
const EMBED_KEYWORDS: &[&str] = &["embed"];
const TOOL_KEYWORDS: &[&str] = &["tool", "function", "agent"];
const REASONING_KEYWORDS: &[&str] = &["r1", "reasoning", "think"];

/// Leading count and unit of a relative time, e.g. "3 days ago" or
/// "About a minute ago".
static RELATIVE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:about\s+)?(\d+|an?)\s+([a-z]+)").expect("valid relative time pattern")
});

/// Unit of a relative time string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    fn from_word(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        let unit = match word.trim_end_matches('s') {
            "second" => TimeUnit::Second,
            "minute" => TimeUnit::Minute,
            "hour" => TimeUnit::Hour,
            "day" => TimeUnit::Day,
            "week" => TimeUnit::Week,
            "month" => TimeUnit::Month,
            "year" => TimeUnit::Year,
            _ => return None,
        };
        Some(unit)
    }

    /// Approximate length of the unit in seconds.
    fn seconds(self) -> u64 {
        match self {
            TimeUnit::Second => 1,
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3_600,
            TimeUnit::Day => 86_400,
            TimeUnit::Week => 7 * 86_400,
            TimeUnit::Month => 30 * 86_400,
            TimeUnit::Year => 365 * 86_400,
        }
    }
}

/// Splits a relative time string into its count and unit.
///
/// "a"/"an" count as one. Returns `None` when either part is missing.
pub fn parse_relative_time(text: &str) -> Option<(u64, TimeUnit)> {
    let captures = RELATIVE_TIME.captures(text)?;
    let count_text = captures.get(1)?.as_str();
    let count = if count_text.eq_ignore_ascii_case("a") || count_text.eq_ignore_ascii_case("an") {
        1
    } else {
        count_text.parse().ok()?
    };
    let unit = TimeUnit::from_word(captures.get(2)?.as_str())?;
    Some((count, unit))
}

/// Approximate age in seconds, used for sorting by modification time.
pub fn relative_age_secs(text: &str) -> Option<u64> {
    parse_relative_time(text).map(|(count, unit)| count.saturating_mul(unit.seconds()))
}

/// Buckets a relative modification time.
///
/// Days up to 14 (weeks up to 2) are recent, days up to 28 (weeks up to 4)
/// are moderate, anything longer is old. Months are always old. Any other
/// unit, and unparseable text, is unknown.
pub fn classify_age(modified: &str) -> AgeCategory {
    let Some((count, unit)) = parse_relative_time(modified) else {
        return AgeCategory::Unknown;
    };

    match unit {
        TimeUnit::Day => match count {
            0..=14 => AgeCategory::Recent,
            15..=28 => AgeCategory::Moderate,
            _ => AgeCategory::Old,
        },
        TimeUnit::Week => match count {
            0..=2 => AgeCategory::Recent,
            3..=4 => AgeCategory::Moderate,
            _ => AgeCategory::Old,
        },
        TimeUnit::Month => AgeCategory::Old,
        TimeUnit::Second | TimeUnit::Minute | TimeUnit::Hour | TimeUnit::Year => AgeCategory::Unknown,
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

/// Capability tags guessed from the model name. Text is always present.
pub fn capabilities(name: &str) -> BTreeSet<Capability> {
    let lower = name.to_lowercase();
    let mut tags = BTreeSet::from([Capability::Text]);

    let checks = [
        (VISION_KEYWORDS, Capability::Vision),
        (CODE_KEYWORDS, Capability::Code),
        (EMBED_KEYWORDS, Capability::Embed),
        (TOOL_KEYWORDS, Capability::Tools),
        (REASONING_KEYWORDS, Capability::Reasoning),
    ];
    for (keywords, capability) in checks {
        if contains_any(&lower, keywords) {
            tags.insert(capability);
        }
    }

    tags
}

/// Whether the name carries a liberation keyword.
pub fn is_liberated(name: &str) -> bool {
    contains_any(&name.to_lowercase(), LIBERATION_KEYWORDS)
}
