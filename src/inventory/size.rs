//! Size strings as printed by the model manager ("4.7 GB", "274 MB").
//!
//! Units are treated as powers of 1024.

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Parses "value unit" into bytes. Returns `None` for anything malformed.
pub fn parse_size(size: &str) -> Option<f64> {
    let mut parts = size.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?.to_uppercase();

    let multiplier = match unit.as_str() {
        "TB" | "T" => TB,
        "GB" | "G" => GB,
        "MB" | "M" => MB,
        "KB" | "K" => KB,
        "B" => 1.0,
        _ => return None,
    };

    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value * multiplier)
}

/// Size in gigabytes, used by the large/small filters.
pub fn size_in_gb(size: &str) -> Option<f64> {
    parse_size(size).map(|bytes| bytes / GB)
}

/// Sum of all parseable sizes. Malformed entries are skipped.
pub fn total_bytes<'a>(sizes: impl IntoIterator<Item = &'a str>) -> f64 {
    sizes.into_iter().filter_map(parse_size).sum()
}

/// Human readable size with one decimal (KB, MB, GB or TB).
pub fn format_bytes(bytes: f64) -> String {
    if bytes >= TB {
        format!("{:.1} TB", bytes / TB)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} KB", bytes / KB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_units() {
        assert_eq!(parse_size("1 KB"), Some(1024.0));
        assert_eq!(parse_size("2 MB"), Some(2.0 * MB));
        assert_eq!(parse_size("4.7 GB"), Some(4.7 * GB));
        assert_eq!(parse_size("1 tb"), Some(TB));
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("big"), None);
        assert_eq!(parse_size("4.7"), None);
        assert_eq!(parse_size("4.7 parsecs"), None);
    }

    #[test]
    fn test_total_skips_malformed() {
        let total = total_bytes(["1 GB", "garbage", "512 MB"]);
        assert_eq!(total, 1.5 * GB);
        assert_eq!(format_bytes(total), "1.5 GB");
    }

    #[test]
    fn test_format_thresholds() {
        assert_eq!(format_bytes(0.0), "0.0 KB");
        assert_eq!(format_bytes(274.0 * MB), "274.0 MB");
        assert_eq!(format_bytes(2.0 * TB), "2.0 TB");
    }

    #[test]
    fn test_size_in_gb_respects_unit() {
        assert_eq!(size_in_gb("512 MB"), Some(0.5));
        assert_eq!(size_in_gb("19 GB"), Some(19.0));
    }
}
