use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Patterns camera firmware bakes into file names, tried in order. The bare
/// date form resolves to midnight.
static DATETIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^IMG_(\d{8})_(\d{6})").unwrap(),
        Regex::new(r"^VID_(\d{8})_(\d{6})").unwrap(),
        Regex::new(r"^(\d{8})_(\d{6})").unwrap(),
    ]
});

static DATE_ONLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").unwrap());

/// Try to recover a capture timestamp from a file name. Returns an ISO 8601
/// string matching what the other timestamp sources produce.
pub fn timestamp_from_filename(file_name: &str) -> Option<String> {
    for pattern in DATETIME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(file_name) {
            let raw = format!("{} {}", &caps[1], &caps[2]);
            if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, "%Y%m%d %H%M%S") {
                return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
            }
        }
    }

    if let Some(caps) = DATE_ONLY_PATTERN.captures(file_name) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            let midnight = date.and_hms_opt(0, 0, 0).unwrap();
            return Some(midnight.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }

    None
}
