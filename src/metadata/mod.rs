pub mod exif;
pub mod filename;
pub mod sidecar;
pub mod video;

use self::exif::ExifMetadata;
use self::sidecar::SidecarMetadata;
use self::video::VideoMetadata;

/// The merged view of every metadata source for one file. EXIF fields ride
/// along unmerged on the media record itself; this struct holds everything
/// where more than one source competes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub capture_timestamp: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub google_geo_latitude: Option<f64>,
    pub google_geo_longitude: Option<f64>,
    pub google_geo_altitude: Option<f64>,
}

/// Merge with fixed precedence:
/// timestamp from sidecar, then EXIF, then the file name;
/// dimensions from the video container, then EXIF resolution;
/// geo and description from the sidecar only;
/// title from the sidecar, then the file name stem.
pub fn aggregate(
    file_name: &str,
    sidecar: Option<&SidecarMetadata>,
    exif: &ExifMetadata,
    resolution: Option<(u32, u32)>,
    video: Option<&VideoMetadata>,
) -> AggregatedMetadata {
    let mut merged = AggregatedMetadata::default();

    merged.capture_timestamp = sidecar
        .and_then(|s| s.photo_taken_time)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
        .or_else(|| exif.datetime_original.clone())
        .or_else(|| filename::timestamp_from_filename(file_name));

    if let Some(s) = sidecar {
        merged.description = s.description.clone();
        merged.google_geo_latitude = s.geo_latitude;
        merged.google_geo_longitude = s.geo_longitude;
        merged.google_geo_altitude = s.geo_altitude;
    }

    let video_dims = video.and_then(|v| v.width.zip(v.height));
    (merged.width, merged.height) = match (video_dims, resolution) {
        (Some((w, h)), _) => (Some(w), Some(h)),
        (None, Some((w, h))) => (Some(i64::from(w)), Some(i64::from(h))),
        (None, None) => (None, None),
    };

    if let Some(v) = video {
        merged.duration_seconds = v.duration_seconds;
        merged.frame_rate = v.frame_rate;
    }

    merged.title = sidecar
        .and_then(|s| s.title.clone())
        .or_else(|| Some(file_stem(file_name).to_string()));

    merged
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}
