use std::fs;

use tracing::debug;
use uuid::Uuid;

use crate::db::media_items::MediaItemRecord;
use crate::errors::{ErrorType, ScanError};
use crate::fingerprint::{content_fingerprint, crc32_hex, sidecar_fingerprint};
use crate::metadata::aggregate;
use crate::metadata::exif::{ExifMetadata, extract_exif_smart, extract_resolution};
use crate::metadata::sidecar::{SidecarMetadata, parse_sidecar_bytes};
use crate::metadata::video::{VideoMetadata, extract_video_metadata};
use crate::mime::{detect_mime, is_image_mime, is_video_mime};
use crate::paths::album_id_for_path;
use crate::scan::discover::FileTask;
use crate::scan::tools::ToolAvailability;
use crate::scan::{FailureRecord, WorkerMsg};

/// Read-only knobs shared by every worker in the pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext {
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
    pub tools: ToolAvailability,
}

/// Run the full per-file pipeline and emit the resulting messages. A broken
/// sidecar produces a failure message and the media record without sidecar
/// fields; a broken media file produces a failure message only. The
/// function is pure with respect to the catalog: workers never see the
/// database.
pub fn process_file(task: &FileTask, ctx: &WorkerContext, scan_run_id: &str) -> Vec<WorkerMsg> {
    let mut messages = Vec::with_capacity(2);

    let (sidecar, sidecar_fingerprint) = match read_sidecar(task) {
        Ok(pair) => pair,
        Err(e) => {
            messages.push(WorkerMsg::Failure(FailureRecord {
                relative_path: task
                    .json_sidecar_relative
                    .clone()
                    .unwrap_or_else(|| task.relative_path.clone()),
                error_type: ErrorType::Sidecar,
                error: e,
            }));
            (None, None)
        }
    };

    match build_record(task, ctx, scan_run_id, sidecar, sidecar_fingerprint) {
        Ok(record) => messages.push(WorkerMsg::Item(Box::new(record))),
        Err(e) => messages.push(WorkerMsg::Failure(FailureRecord {
            relative_path: task.relative_path.clone(),
            error_type: ErrorType::MediaFile,
            error: e,
        })),
    }

    messages
}

type SidecarResult = (Option<SidecarMetadata>, Option<String>);

/// Read and parse the paired sidecar, fingerprinting the raw bytes first.
fn read_sidecar(task: &FileTask) -> Result<SidecarResult, ScanError> {
    let Some(sidecar_path) = &task.json_sidecar_path else {
        return Ok((None, None));
    };

    let fingerprint = sidecar_fingerprint(sidecar_path)?;
    let bytes =
        fs::read(sidecar_path).map_err(|e| ScanError::from_io(e, sidecar_path.as_str()))?;

    let meta = parse_sidecar_bytes(&bytes, sidecar_path.as_str())?;
    Ok((Some(meta), Some(fingerprint)))
}

fn build_record(
    task: &FileTask,
    ctx: &WorkerContext,
    scan_run_id: &str,
    sidecar: Option<SidecarMetadata>,
    sidecar_fingerprint: Option<String>,
) -> Result<MediaItemRecord, ScanError> {
    let path = &task.file_path;

    let mime = detect_mime(path)?;
    let crc32 = crc32_hex(path)?;
    let fingerprint = content_fingerprint(path, task.file_size)?;

    let mut exif = ExifMetadata::default();
    let mut resolution = None;
    if is_image_mime(&mime) {
        exif = extract_exif_smart(path, ctx.use_exiftool, &ctx.tools)?;
        resolution = extract_resolution(path);
    }

    let mut video: Option<VideoMetadata> = None;
    if is_video_mime(&mime) && ctx.use_ffprobe && ctx.tools.ffprobe {
        video = extract_video_metadata(path)?;
        if video.is_none() {
            debug!("ffprobe produced no metadata for {path}");
        }
    }

    let file_name = path.file_name().unwrap_or(task.relative_path.as_str());
    let merged = aggregate(file_name, sidecar.as_ref(), &exif, resolution, video.as_ref());

    Ok(MediaItemRecord {
        media_item_id: Uuid::new_v4().to_string(),
        relative_path: task.relative_path.clone(),
        album_id: album_id_for_path(&task.album_folder_path).to_string(),
        title: merged.title,
        mime_type: Some(mime),
        file_size: task.file_size as i64,
        crc32: Some(crc32),
        content_fingerprint: Some(fingerprint),
        sidecar_fingerprint,
        json_sidecar_path: task.json_sidecar_relative.clone(),
        width: merged.width,
        height: merged.height,
        duration_seconds: merged.duration_seconds,
        frame_rate: merged.frame_rate,
        capture_timestamp: merged.capture_timestamp,
        exif_datetime_original: exif.datetime_original,
        exif_datetime_digitized: exif.datetime_digitized,
        exif_gps_latitude: exif.gps_latitude,
        exif_gps_longitude: exif.gps_longitude,
        exif_gps_altitude: exif.gps_altitude,
        exif_camera_make: exif.camera_make,
        exif_camera_model: exif.camera_model,
        exif_lens_make: exif.lens_make,
        exif_lens_model: exif.lens_model,
        exif_focal_length: exif.focal_length,
        exif_f_number: exif.f_number,
        exif_exposure_time: exif.exposure_time,
        exif_iso: exif.iso,
        exif_orientation: exif.orientation,
        google_description: merged.description,
        google_geo_latitude: merged.google_geo_latitude,
        google_geo_longitude: merged.google_geo_longitude,
        google_geo_altitude: merged.google_geo_altitude,
        people: sidecar.map(|s| s.people).unwrap_or_default(),
        scan_run_id: scan_run_id.to_string(),
    })
}
