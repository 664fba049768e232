use camino::Utf8Path;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::metadata::exif::extract_exif_smart;
use crate::metadata::sidecar::sidecar_taken_time;
use crate::metadata::video::extract_video_metadata;
use crate::scan::tools::ToolAvailability;

/// Default tolerance for timestamp-fallback pairing.
pub const TIMESTAMP_TOLERANCE_SECONDS: i64 = 1;

/// Takeout has shipped both the full and a truncated sidecar suffix.
const SIDECAR_SUFFIXES: &[&str] = &["supplemental-metadata", "supplemental-me"];

static NUMBERED_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\((\d+)\)$").unwrap());

/// Candidate sidecar file names for a media file, most specific first.
///
/// For `x(1).jpg` the `(N)` counter migrates between the stem and the
/// suffix, so `x.jpg.supplemental-metadata(1).json` and friends are tried
/// too. Comparison happens on normalized names, case-sensitively.
pub fn sidecar_candidates(file_name: &str) -> Vec<String> {
    let mut candidates = vec![format!("{file_name}.json")];

    for suffix in SIDECAR_SUFFIXES {
        candidates.push(format!("{file_name}.{suffix}.json"));
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    candidates.push(format!("{stem}.json"));

    for suffix in SIDECAR_SUFFIXES {
        candidates.push(format!("{stem}.{suffix}.json"));
    }

    // numbered duplicates: x(1).jpg pairs with x.jpg.supplemental-metadata(1).json
    if let Some(caps) = NUMBERED_STEM.captures(stem) {
        let base = &caps[1];
        let counter = &caps[2];
        if let Some(ext) = ext {
            for suffix in SIDECAR_SUFFIXES {
                candidates.push(format!("{base}.{ext}.{suffix}({counter}).json"));
            }
            candidates.push(format!("{base}.{ext}({counter}).json"));
        }
        for suffix in SIDECAR_SUFFIXES {
            candidates.push(format!("{base}.{suffix}({counter}).json"));
        }
    }

    candidates.dedup();
    candidates
}

/// Best-effort capture timestamp of a media file, for fallback pairing.
/// EXIF is tried first, then the video container when ffprobe is in play.
/// Naive EXIF times are taken as UTC, which is what the sidecar carries.
pub fn parse_media_timestamp(
    path: &Utf8Path,
    use_exiftool: bool,
    use_ffprobe: bool,
    tools: &ToolAvailability,
) -> Option<DateTime<Utc>> {
    if let Ok(exif) = extract_exif_smart(path, use_exiftool, tools) {
        let raw = exif.datetime_original.or(exif.datetime_digitized);
        if let Some(dt) = raw.as_deref().and_then(parse_iso_as_utc) {
            return Some(dt);
        }
    }

    if use_ffprobe && tools.ffprobe {
        if let Ok(Some(video)) = extract_video_metadata(path) {
            if let Some(dt) = video.creation_time.as_deref().and_then(parse_iso_as_utc) {
                return Some(dt);
            }
        }
    }

    debug!("no timestamp found in media file {}", path);
    None
}

fn parse_iso_as_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

pub fn timestamps_match(a: DateTime<Utc>, b: DateTime<Utc>, tolerance_seconds: i64) -> bool {
    (a - b).num_seconds().abs() <= tolerance_seconds
}

/// Fallback pairing for a sidecar that no filename pattern claimed: compare
/// its `photoTakenTime` against each still-unmatched media file in the same
/// folder. First match wins; returns the index into `candidates`.
pub fn match_sidecar_by_metadata(
    sidecar_path: &Utf8Path,
    candidates: &[&Utf8Path],
    tolerance_seconds: i64,
    use_exiftool: bool,
    use_ffprobe: bool,
    tools: &ToolAvailability,
) -> Option<usize> {
    let sidecar_ts = sidecar_taken_time(sidecar_path)?;

    for (idx, media_path) in candidates.iter().enumerate() {
        let media_ts = parse_media_timestamp(media_path, use_exiftool, use_ffprobe, tools);
        if let Some(media_ts) = media_ts {
            if timestamps_match(sidecar_ts, media_ts, tolerance_seconds) {
                info!(
                    "timestamp match: {} -> {} ({})",
                    sidecar_path, media_path, sidecar_ts
                );
                return Some(idx);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn plain_file_candidates() {
        let candidates = sidecar_candidates("IMG_001.jpg");
        assert!(candidates.contains(&"IMG_001.jpg.json".to_string()));
        assert!(candidates.contains(&"IMG_001.jpg.supplemental-metadata.json".to_string()));
        assert!(candidates.contains(&"IMG_001.jpg.supplemental-me.json".to_string()));
        assert!(candidates.contains(&"IMG_001.json".to_string()));
        // full-name form is preferred over the stem form
        let full = candidates
            .iter()
            .position(|c| c == "IMG_001.jpg.json")
            .unwrap();
        let stem = candidates.iter().position(|c| c == "IMG_001.json").unwrap();
        assert!(full < stem);
    }

    #[test]
    fn numbered_duplicate_counter_migrates_into_the_suffix() {
        let candidates = sidecar_candidates("4_13_12 - 1(1).jpg");
        assert!(
            candidates.contains(&"4_13_12 - 1.supplemental-metadata(1).json".to_string()),
            "got {candidates:?}"
        );
        assert!(candidates.contains(&"4_13_12 - 1.jpg.supplemental-metadata(1).json".to_string()));
        assert!(candidates.contains(&"4_13_12 - 1.jpg(1).json".to_string()));
    }

    #[test]
    fn extensionless_file_still_gets_candidates() {
        let candidates = sidecar_candidates("README");
        assert!(candidates.contains(&"README.json".to_string()));
    }

    #[test]
    fn tolerance_window_is_inclusive() {
        let a = Utc.with_ymd_and_hms(2021, 6, 15, 14, 30, 22).unwrap();
        let b = Utc.with_ymd_and_hms(2021, 6, 15, 14, 30, 23).unwrap();
        let c = Utc.with_ymd_and_hms(2021, 6, 15, 14, 30, 25).unwrap();
        assert!(timestamps_match(a, b, 1));
        assert!(timestamps_match(b, a, 1));
        assert!(!timestamps_match(a, c, 1));
    }

    #[test]
    fn iso_parsing_accepts_naive_and_offset_forms() {
        assert_eq!(
            parse_iso_as_utc("2021-06-15T14:30:22").unwrap(),
            Utc.with_ymd_and_hms(2021, 6, 15, 14, 30, 22).unwrap()
        );
        assert_eq!(
            parse_iso_as_utc("2021-06-15T16:30:22+02:00").unwrap(),
            Utc.with_ymd_and_hms(2021, 6, 15, 14, 30, 22).unwrap()
        );
        assert_eq!(parse_iso_as_utc("junk"), None);
    }
}
