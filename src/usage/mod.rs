//! # Usage Module
//!
//! Read-only cross-reference with Open WebUI's `webui.db`: how often each
//! model was chatted with, when, and how many tokens it produced. Nothing is
//! ever written back to that database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::vault::{self, ObfuscationKey, VaultError};

pub mod locate;
pub mod query;

pub use locate::{locate_data_dir, LocateOptions, DATABASE_FILE, OBFUSCATED_DATABASE_FILE};
pub use query::query_usage;

/// Prefixes Open WebUI may put in front of a model name.
const NAME_PREFIXES: &[&str] = &["ollama/", "local/", "models/"];

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("No Open WebUI database in {0}")]
    NotFound(PathBuf),
    #[error("Database query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Usage statistics of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Number of chats using the model
    pub count: u64,
    /// Most recent chat update, epoch seconds
    pub last_used: Option<i64>,
    /// Oldest chat update, epoch seconds
    pub first_used: Option<i64>,
    pub total_tokens: u64,
    /// Model name as stored by Open WebUI
    pub original_name: String,
}

impl UsageInfo {
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn first_used_at(&self) -> Option<DateTime<Utc>> {
        self.first_used.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Lower-cases, trims and strips the known prefixes, so that
/// "Ollama/Llama2:7B" and "llama2:7b" share a key.
pub fn normalize_name(name: &str) -> String {
    let mut clean = name.trim().to_lowercase();
    for prefix in NAME_PREFIXES {
        if let Some(rest) = clean.strip_prefix(prefix) {
            clean = rest.to_string();
        }
    }
    clean
}

/// Usage statistics keyed by normalized model name.
#[derive(Debug, Clone, Default)]
pub struct UsageCache {
    entries: HashMap<String, UsageInfo>,
}

impl UsageCache {
    pub fn from_entries(entries: impl IntoIterator<Item = UsageInfo>) -> Self {
        let mut cache = Self::default();
        for entry in entries {
            cache
                .entries
                .entry(normalize_name(&entry.original_name))
                .and_modify(|existing| merge(existing, &entry))
                .or_insert(entry);
        }
        cache
    }

    /// Usage of `name`; `None` means never used.
    pub fn lookup(&self, name: &str) -> Option<&UsageInfo> {
        self.entries.get(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Two stored names that normalize to the same key are one model.
fn merge(existing: &mut UsageInfo, other: &UsageInfo) {
    existing.count += other.count;
    existing.total_tokens += other.total_tokens;
    existing.last_used = existing.last_used.max(other.last_used);
    existing.first_used = match (existing.first_used, other.first_used) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}

/// A located Open WebUI data directory.
#[derive(Debug, Clone)]
pub struct UsageDatabase {
    data_dir: PathBuf,
    key: Option<ObfuscationKey>,
}

impl UsageDatabase {
    /// `key` is needed to read an obfuscated `webui.db.enc`.
    pub fn new(data_dir: impl Into<PathBuf>, key: Option<ObfuscationKey>) -> Self {
        Self { data_dir: data_dir.into(), key }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reads usage statistics, preferring the obfuscated copy.
    ///
    /// An obfuscated database is revealed to a temporary file that is shredded
    /// as soon as the query finishes.
    pub fn read(&self) -> Result<UsageCache, UsageError> {
        let obfuscated = self.data_dir.join(OBFUSCATED_DATABASE_FILE);
        let plain = self.data_dir.join(DATABASE_FILE);

        let rows = if obfuscated.is_file() {
            let key = match &self.key {
                Some(key) => key.clone(),
                None => ObfuscationKey::for_current_user()?,
            };
            let revealed = vault::reveal_to_temp(&obfuscated, &key)?;
            query_usage(revealed.path())?
        } else if plain.is_file() {
            query_usage(&plain)?
        } else {
            return Err(UsageError::NotFound(self.data_dir.clone()));
        };

        let cache = UsageCache::from_entries(rows);
        info!("Loaded usage data for {} models from Open WebUI", cache.len());
        Ok(cache)
    }

    /// Like [`read`](Self::read), but any failure degrades to an empty cache.
    pub fn load(&self) -> UsageCache {
        self.read().unwrap_or_else(|e| {
            warn!("Error reading Open WebUI database: {}", e);
            UsageCache::default()
        })
    }
}

/// Renders a last-used timestamp relative to `now`.
pub fn format_last_used(timestamp: Option<i64>, now: DateTime<Utc>) -> String {
    let Some(ts) = timestamp else {
        return "Never used".to_string();
    };
    let Some(then) = DateTime::from_timestamp(ts, 0) else {
        return "Unknown".to_string();
    };

    let diff = now.signed_duration_since(then);
    let days = diff.num_days();
    let plural = |n: i64| if n > 1 { "s" } else { "" };

    if days <= 0 {
        if diff.num_hours() <= 0 {
            format!("{} minutes ago", diff.num_minutes().max(0))
        } else {
            format!("{} hours ago", diff.num_hours())
        }
    } else if days == 1 {
        "1 day ago".to_string()
    } else if days < 7 {
        format!("{} days ago", days)
    } else if days < 30 {
        let weeks = days / 7;
        format!("{} week{} ago", weeks, plural(weeks))
    } else if days < 365 {
        let months = days / 30;
        format!("{} month{} ago", months, plural(months))
    } else {
        let years = days / 365;
        format!("{} year{} ago", years, plural(years))
    }
}
