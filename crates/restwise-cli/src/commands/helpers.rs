//! Helper utility functions for CLI commands

use restwise_core::config::BreakConfig;
use restwise_storage::BreakType;
use serde::Serialize;
use std::time::Duration;

/// Safely truncate a string to a maximum number of characters (not bytes).
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Quote a CSV field when it contains a comma, quote or newline
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// `1h 02m 03s`, `4m 05s` or `6s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Format a 0-1 ratio as a whole percentage
pub fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Serialized name of a unit enum (`focused`, `increasing`, ...)
pub fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Configured length of a break type. Personalized breaks default to the
/// regular length.
pub fn default_break_secs(config: &BreakConfig, break_type: BreakType) -> u64 {
    match break_type {
        BreakType::Micro => config.micro_secs,
        BreakType::Regular | BreakType::Personalized => config.regular_secs,
        BreakType::Long => config.long_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restwise_storage::{FacialExpression, Trend};

    #[test]
    fn test_truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_str_long() {
        assert_eq!(truncate_str("hello world", 5), "hello...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(6)), "6s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
        assert_eq!(format_duration(Duration::from_millis(1900)), "1s");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.0), "0%");
        assert_eq!(percent(0.456), "46%");
        assert_eq!(percent(1.0), "100%");
    }

    #[test]
    fn test_label_uses_serialized_name() {
        assert_eq!(label(&Trend::Increasing), "increasing");
        assert_eq!(label(&FacialExpression::Tired), "tired");
        assert_eq!(label(&42), "unknown");
    }

    #[test]
    fn test_default_break_secs() {
        let config = BreakConfig::default();
        assert_eq!(default_break_secs(&config, BreakType::Micro), 180);
        assert_eq!(default_break_secs(&config, BreakType::Regular), 300);
        assert_eq!(default_break_secs(&config, BreakType::Personalized), 300);
        assert_eq!(default_break_secs(&config, BreakType::Long), 600);
    }
}
