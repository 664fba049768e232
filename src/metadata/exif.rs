use std::fs::File;
use std::io::BufReader;
use std::process::Command;

use camino::Utf8Path;
use chrono::NaiveDateTime;
use exif::{In, Tag, Value};
use tracing::{debug, warn};

use crate::errors::ScanError;
use crate::scan::tools::ToolAvailability;

/// Canonical EXIF fields stored on a media item. Timestamps are ISO 8601
/// strings, GPS is decimal degrees with hemisphere sign applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifMetadata {
    pub datetime_original: Option<String>,
    pub datetime_digitized: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<f64>,
    pub f_number: Option<f64>,
    pub exposure_time: Option<String>,
    pub iso: Option<i64>,
    pub orientation: Option<i64>,
}

impl ExifMetadata {
    pub fn is_empty(&self) -> bool {
        *self == ExifMetadata::default()
    }
}

/// Extract EXIF with the built-in reader, falling back to ExifTool when the
/// built-in reader found nothing, the config asks for it, and the tool is
/// present. RAW and HEIC files usually take the fallback path.
pub fn extract_exif_smart(
    path: &Utf8Path,
    use_exiftool: bool,
    tools: &ToolAvailability,
) -> Result<ExifMetadata, ScanError> {
    let builtin = extract_exif(path)?;

    if builtin.is_empty() && use_exiftool && tools.exiftool {
        return extract_with_exiftool(path);
    }

    Ok(builtin)
}

/// Built-in extraction via the EXIF container reader. Files without an EXIF
/// segment produce an empty record, not an error.
pub fn extract_exif(path: &Utf8Path) -> Result<ExifMetadata, ScanError> {
    let file = File::open(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    let mut reader = BufReader::new(file);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::Io(e)) => return Err(ScanError::from_io(e, path.as_str())),
        Err(e) => {
            debug!("no usable exif in {}: {}", path, e);
            return Ok(ExifMetadata::default());
        }
    };

    let mut meta = ExifMetadata {
        datetime_original: ascii_field(&exif, Tag::DateTimeOriginal).and_then(parse_exif_datetime),
        datetime_digitized: ascii_field(&exif, Tag::DateTimeDigitized)
            .and_then(parse_exif_datetime),
        camera_make: ascii_field(&exif, Tag::Make),
        camera_model: ascii_field(&exif, Tag::Model),
        lens_make: ascii_field(&exif, Tag::LensMake),
        lens_model: ascii_field(&exif, Tag::LensModel),
        focal_length: rational_field(&exif, Tag::FocalLength),
        f_number: rational_field(&exif, Tag::FNumber),
        exposure_time: exposure_field(&exif),
        iso: int_field(&exif, Tag::PhotographicSensitivity),
        orientation: int_field(&exif, Tag::Orientation),
        ..Default::default()
    };

    if let Some(lat) = gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S') {
        meta.gps_latitude = Some(lat);
    }
    if let Some(lon) = gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W') {
        meta.gps_longitude = Some(lon);
    }
    meta.gps_altitude = gps_altitude(&exif);

    Ok(meta)
}

/// Image dimensions from the container header, without decoding pixels.
/// Arbitrarily large images stay cheap this way. Returns None and logs when
/// the header cannot be read.
pub fn extract_resolution(path: &Utf8Path) -> Option<(u32, u32)> {
    let reader = match image::ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("could not open image header for {}: {}", path, e);
            return None;
        }
    };

    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(e) => {
            warn!("could not read image dimensions for {}: {}", path, e);
            None
        }
    }
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(chunks) => {
            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
            let s = String::from_utf8_lossy(&joined).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

fn rational_field(exif: &exif::Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Rational(values) => values.first().map(|r| r.to_f64()),
        _ => None,
    }
}

fn int_field(exif: &exif::Exif, tag: Tag) -> Option<i64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    field.value.get_uint(0).map(i64::from)
}

/// Exposure is stored as a rational and reported the way photographers read
/// it, `1/100` for sub-second values.
fn exposure_field(exif: &exif::Exif) -> Option<String> {
    let field = exif.get_field(Tag::ExposureTime, In::PRIMARY)?;
    match &field.value {
        Value::Rational(values) => values.first().map(|r| {
            if r.num < r.denom && r.num > 0 {
                format!("{}/{}", r.num, r.denom)
            } else {
                format!("{}", r.to_f64())
            }
        }),
        _ => None,
    }
}

/// Degrees/minutes/seconds triplet to signed decimal degrees. `negative_ref`
/// is the hemisphere letter that flips the sign.
fn gps_coordinate(exif: &exif::Exif, tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let sign = match exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(chunks) => chunks
                .first()
                .and_then(|c| c.first())
                .map(|b| *b as char),
            _ => None,
        }) {
        Some(r) if r.eq_ignore_ascii_case(&negative_ref) => -1.0,
        _ => 1.0,
    };

    Some(sign * degrees)
}

fn gps_altitude(exif: &exif::Exif) -> Option<f64> {
    let altitude = rational_field(exif, Tag::GPSAltitude)?;
    // ref byte 1 means below sea level
    let below = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v == 1)
        .unwrap_or(false);
    Some(if below { -altitude } else { altitude })
}

/// `2021:06:15 14:30:22` to `2021-06-15T14:30:22`.
fn parse_exif_datetime(raw: String) -> Option<String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// ExifTool fallback, numeric output mode. One JSON object per file.
fn extract_with_exiftool(path: &Utf8Path) -> Result<ExifMetadata, ScanError> {
    let output = Command::new("exiftool")
        .args(["-json", "-n", path.as_str()])
        .output()
        .map_err(|e| ScanError::from_io(e, path.as_str()))?;

    if !output.status.success() {
        return Err(ScanError::Corrupted(format!(
            "{path}: exiftool exited with {}",
            output.status
        )));
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| ScanError::from_json(e, path.as_str()))?;
    let obj = parsed
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| ScanError::Parse(format!("{path}: empty exiftool output")))?;

    let str_of = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let f64_of = |key: &str| obj.get(key).and_then(|v| v.as_f64());
    let i64_of = |key: &str| obj.get(key).and_then(|v| v.as_i64());

    Ok(ExifMetadata {
        datetime_original: str_of("DateTimeOriginal").and_then(parse_exif_datetime),
        datetime_digitized: str_of("CreateDate").and_then(parse_exif_datetime),
        gps_latitude: f64_of("GPSLatitude"),
        gps_longitude: f64_of("GPSLongitude"),
        gps_altitude: f64_of("GPSAltitude"),
        camera_make: str_of("Make"),
        camera_model: str_of("Model"),
        lens_make: str_of("LensMake"),
        lens_model: str_of("LensModel"),
        focal_length: f64_of("FocalLength"),
        f_number: f64_of("FNumber"),
        exposure_time: f64_of("ExposureTime").map(format_exposure_seconds),
        iso: i64_of("ISO"),
        orientation: i64_of("Orientation"),
    })
}

fn format_exposure_seconds(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        format!("1/{}", (1.0 / seconds).round() as u64)
    } else {
        format!("{seconds}")
    }
}
