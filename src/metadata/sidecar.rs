use std::fs;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::ScanError;

/// The fields of a Google Takeout sidecar the catalog consumes. Takeout
/// emits many more; everything unrecognized is ignored.
#[derive(Debug, Clone, Default)]
pub struct SidecarMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_taken_time: Option<DateTime<Utc>>,
    pub geo_latitude: Option<f64>,
    pub geo_longitude: Option<f64>,
    pub geo_altitude: Option<f64>,
    pub people: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSidecar {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "photoTakenTime")]
    photo_taken_time: Option<RawTimestamp>,
    #[serde(rename = "geoData")]
    geo_data: Option<RawGeoData>,
    people: Option<Vec<RawPerson>>,
}

#[derive(Debug, Deserialize)]
struct RawTimestamp {
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGeoData {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPerson {
    name: Option<String>,
}

/// Parse a sidecar file. Invalid JSON is a parse error; missing fields are
/// simply absent from the result.
pub fn parse_sidecar(path: &Utf8Path) -> Result<SidecarMetadata, ScanError> {
    let bytes = fs::read(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    parse_sidecar_bytes(&bytes, path.as_str())
}

pub fn parse_sidecar_bytes(bytes: &[u8], path: &str) -> Result<SidecarMetadata, ScanError> {
    let raw: RawSidecar =
        serde_json::from_slice(bytes).map_err(|e| ScanError::from_json(e, path))?;

    let photo_taken_time = raw
        .photo_taken_time
        .and_then(|t| t.timestamp)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    let mut meta = SidecarMetadata {
        title: raw.title.filter(|s| !s.is_empty()),
        description: raw.description.filter(|s| !s.is_empty()),
        photo_taken_time,
        ..Default::default()
    };

    if let Some(geo) = raw.geo_data {
        let lat = geo.latitude.unwrap_or(0.0);
        let lon = geo.longitude.unwrap_or(0.0);
        let alt = geo.altitude.unwrap_or(0.0);
        // Takeout writes (0, 0, 0) when the photo has no location
        if lat != 0.0 || lon != 0.0 || alt != 0.0 {
            meta.geo_latitude = Some(lat);
            meta.geo_longitude = Some(lon);
            meta.geo_altitude = Some(alt);
        }
    }

    if let Some(people) = raw.people {
        meta.people = people.into_iter().filter_map(|p| p.name).collect();
    }

    Ok(meta)
}

/// Just the `photoTakenTime` of a sidecar, used by timestamp-fallback
/// matching. Parse failures map to None so one bad sidecar cannot stop the
/// matcher.
pub fn sidecar_taken_time(path: &Utf8Path) -> Option<DateTime<Utc>> {
    parse_sidecar(path).ok().and_then(|m| m.photo_taken_time)
}
