use std::process::Command;

use camino::Utf8Path;
use chrono::DateTime;
use tracing::debug;

use crate::errors::ScanError;

/// Container-level metadata pulled out of a video file via ffprobe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub creation_time: Option<String>,
}

/// Run ffprobe and parse its JSON report. An unreadable container yields
/// None so one broken video does not surface as a media-file failure here;
/// the caller decides what a missing record means.
pub fn extract_video_metadata(path: &Utf8Path) -> Result<Option<VideoMetadata>, ScanError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
            path.as_str(),
        ])
        .output()
        .map_err(|e| ScanError::from_io(e, path.as_str()))?;

    if !output.status.success() {
        debug!("ffprobe failed on {}: {}", path, output.status);
        return Ok(None);
    }

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| ScanError::from_json(e, path.as_str()))?;

    Ok(Some(parse_ffprobe_report(&report)))
}

fn parse_ffprobe_report(report: &serde_json::Value) -> VideoMetadata {
    let mut meta = VideoMetadata::default();

    let video_stream = report["streams"].as_array().and_then(|streams| {
        streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("video"))
    });

    if let Some(stream) = video_stream {
        meta.width = stream["width"].as_i64();
        meta.height = stream["height"].as_i64();
        meta.frame_rate = stream["avg_frame_rate"]
            .as_str()
            .and_then(parse_frame_rate)
            .or_else(|| stream["r_frame_rate"].as_str().and_then(parse_frame_rate));
    }

    let format = &report["format"];
    meta.duration_seconds = format["duration"].as_str().and_then(|d| d.parse().ok());
    meta.creation_time = format["tags"]["creation_time"]
        .as_str()
        .and_then(normalize_creation_time);

    meta
}

/// ffprobe reports rates as fractions like `30000/1001`; `0/0` means unknown.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, denom) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let denom: f64 = denom.parse().ok()?;
    if denom == 0.0 || num == 0.0 {
        return None;
    }
    Some(num / denom)
}

fn normalize_creation_time(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_typical_report() {
        let report: serde_json::Value = serde_json::from_str(
            r#"{
                "streams": [
                    {"codec_type": "audio", "sample_rate": "48000"},
                    {"codec_type": "video", "width": 1920, "height": 1080,
                     "avg_frame_rate": "30000/1001"}
                ],
                "format": {
                    "duration": "30.500000",
                    "tags": {"creation_time": "2021-06-15T14:30:22.000000Z"}
                }
            }"#,
        )
        .unwrap();

        let meta = parse_ffprobe_report(&report);
        assert_eq!(meta.width, Some(1920));
        assert_eq!(meta.height, Some(1080));
        assert_eq!(meta.duration_seconds, Some(30.5));
        assert!((meta.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(meta.creation_time.as_deref(), Some("2021-06-15T14:30:22+00:00"));
    }

    #[test]
    fn unknown_frame_rate_is_none() {
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
    }

    #[test]
    fn empty_report_yields_empty_metadata() {
        let report = serde_json::json!({});
        assert_eq!(parse_ffprobe_report(&report), VideoMetadata::default());
    }
}
