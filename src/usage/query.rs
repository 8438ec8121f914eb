use std::path::Path;
use chrono::{DateTime, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::{UsageError, UsageInfo};

/// Per-model aggregate over the `chat` table. Only statistics are read,
/// never chat content.
const USAGE_QUERY: &str = "
    SELECT
        json_extract(chat, '$.models[0]') AS model_name,
        COUNT(*) AS usage_count,
        MAX(updated_at) AS last_used,
        MIN(updated_at) AS first_used,
        SUM(CASE WHEN json_extract(meta, '$.usage') IS NOT NULL
                 THEN json_extract(meta, '$.usage.total_tokens')
                 ELSE 0 END) AS total_tokens
    FROM chat
    WHERE json_extract(chat, '$.models[0]') IS NOT NULL
    GROUP BY json_extract(chat, '$.models[0]')
    ORDER BY last_used DESC
";

/// Epoch values above this are milliseconds rather than seconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;
/// Epoch values above this are nanoseconds rather than milliseconds.
const NANOS_THRESHOLD: i64 = 100_000_000_000_000_000;

/// Normalizes an integer epoch of unknown precision to seconds.
fn epoch_seconds(value: i64) -> i64 {
    if value > NANOS_THRESHOLD {
        value / 1_000_000_000
    } else if value > MILLIS_THRESHOLD {
        value / 1_000
    } else {
        value
    }
}

/// Parses ISO-8601 / RFC 3339 text or `YYYY-MM-DD HH:MM:SS`.
fn parse_text_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc().timestamp());
        }
    }
    text.parse::<i64>().ok().map(epoch_seconds)
}

/// Converts a timestamp column of any storage class to epoch seconds.
pub(crate) fn timestamp_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(epoch_seconds(*i)),
        Value::Real(f) => Some(epoch_seconds(*f as i64)),
        Value::Text(text) => parse_text_timestamp(text),
        Value::Null | Value::Blob(_) => None,
    }
}

fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Integer(i) => (*i).max(0) as u64,
        Value::Real(f) if *f > 0.0 => *f as u64,
        Value::Text(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Runs the usage aggregate against the database at `db_path`.
///
/// The database is opened read-only. Returned names are as stored, not
/// normalized.
pub fn query_usage(db_path: &Path) -> Result<Vec<UsageInfo>, UsageError> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let mut stmt = conn.prepare(USAGE_QUERY)?;
    let rows = stmt.query_map([], |row| {
        let name: Option<String> = row.get(0)?;
        let count: Value = row.get(1)?;
        let last_used: Value = row.get(2)?;
        let first_used: Value = row.get(3)?;
        let total_tokens: Value = row.get(4)?;
        Ok((name, count, last_used, first_used, total_tokens))
    })?;

    let mut usage = Vec::new();
    for row in rows {
        let (name, count, last_used, first_used, total_tokens) = row?;
        let Some(name) = name.filter(|name| !name.trim().is_empty()) else {
            continue;
        };
        usage.push(UsageInfo {
            count: count_from_value(&count),
            last_used: timestamp_from_value(&last_used),
            first_used: timestamp_from_value(&first_used),
            total_tokens: count_from_value(&total_tokens),
            original_name: name,
        });
    }

    debug!("Usage query returned {} models", usage.len());
    Ok(usage)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rusqlite::params;

    /// Creates a minimal `chat` table shaped like Open WebUI's.
    pub(crate) fn seed_database(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE chat (id TEXT PRIMARY KEY, chat TEXT, meta TEXT, updated_at INTEGER);",
        )
        .unwrap();

        let rows = [
            ("1", r#"{"models":["llama3:8b"]}"#, r#"{"usage":{"total_tokens":120}}"#, 1_700_000_000i64),
            ("2", r#"{"models":["llama3:8b"]}"#, r#"{}"#, 1_700_000_500),
            ("3", r#"{"models":["ollama/Qwen2:7B"]}"#, r#"{"usage":{"total_tokens":30}}"#, 1_700_100_000_000),
            ("4", r#"{"models":[]}"#, r#"{}"#, 1_700_000_000),
            ("5", r#"{"title":"no models"}"#, r#"{}"#, 1_700_000_000),
        ];
        for (id, chat, meta, updated_at) in rows {
            conn.execute(
                "INSERT INTO chat (id, chat, meta, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, chat, meta, updated_at],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_query_aggregates_per_model() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("webui.db");
        seed_database(&db);

        let usage = query_usage(&db).unwrap();
        assert_eq!(usage.len(), 2);

        let llama = usage.iter().find(|u| u.original_name == "llama3:8b").unwrap();
        assert_eq!(llama.count, 2);
        assert_eq!(llama.total_tokens, 120);
        assert_eq!(llama.first_used, Some(1_700_000_000));
        assert_eq!(llama.last_used, Some(1_700_000_500));

        let qwen = usage.iter().find(|u| u.original_name == "ollama/Qwen2:7B").unwrap();
        assert_eq!(qwen.count, 1);
        assert_eq!(qwen.total_tokens, 30);
        // stored in milliseconds
        assert_eq!(qwen.last_used, Some(1_700_100_000));
    }

    #[test]
    fn test_missing_table_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("empty.db");
        Connection::open(&db).unwrap();

        assert!(query_usage(&db).is_err());
    }

    #[test]
    fn test_timestamp_conversions() {
        assert_eq!(timestamp_from_value(&Value::Integer(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(timestamp_from_value(&Value::Integer(1_700_000_000_000)), Some(1_700_000_000));
        assert_eq!(
            timestamp_from_value(&Value::Integer(1_700_000_000_000_000_000)),
            Some(1_700_000_000)
        );
        assert_eq!(
            timestamp_from_value(&Value::Text("2023-11-14T22:13:20Z".to_string())),
            Some(1_700_000_000)
        );
        assert_eq!(
            timestamp_from_value(&Value::Text("2023-11-14 22:13:20".to_string())),
            Some(1_700_000_000)
        );
        assert_eq!(timestamp_from_value(&Value::Null), None);
        assert_eq!(timestamp_from_value(&Value::Text("soon".to_string())), None);
    }
}
