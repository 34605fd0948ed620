//! Display formatting helpers shared by the CLI and the browser.

use chrono::{Local, TimeZone};

/// Format a byte count in human-readable form (1024-based).
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let units = ['K', 'M', 'G', 'T', 'P', 'E'];
    format!("{:.1} {}B", bytes as f64 / div as f64, units[exp])
}

/// Format a Unix-millisecond timestamp as a short local time, e.g.
/// `Jan 2 15:04`. Zero renders as `N/A`.
pub fn format_time(unix_millis: i64) -> String {
    if unix_millis == 0 {
        return "N/A".to_string();
    }
    match Local.timestamp_opt(unix_millis / 1000, 0).single() {
        Some(time) => time.format("%b %-d %H:%M").to_string(),
        None => "N/A".to_string(),
    }
}

/// Icon for a BigQuery table type.
pub fn table_type_icon(table_type: &str) -> &'static str {
    match table_type.to_uppercase().as_str() {
        "TABLE" => "📋",
        "VIEW" => "👁️",
        "MATERIALIZED_VIEW" => "💎",
        _ => "❓",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_format_time_zero() {
        assert_eq!(format_time(0), "N/A");
    }

    #[test]
    fn test_format_time_renders_month_and_day() {
        let formatted = format_time(1_700_000_000_000);
        assert!(formatted.contains("Nov"));
        assert!(!formatted.contains("N/A"));
    }

    #[test]
    fn test_table_type_icons() {
        assert_eq!(table_type_icon("TABLE"), "📋");
        assert_eq!(table_type_icon("view"), "👁️");
        assert_eq!(table_type_icon("MATERIALIZED_VIEW"), "💎");
        assert_eq!(table_type_icon("SNAPSHOT"), "❓");
    }
}
