use sqlx::SqliteConnection;

/// Everything a CPU worker produces for one media file. Plain data: records
/// cross the results queue by value and the worker never sees the database.
#[derive(Debug, Clone, Default)]
pub struct MediaItemRecord {
    pub media_item_id: String,
    pub relative_path: String,
    pub album_id: String,
    pub title: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub crc32: Option<String>,
    pub content_fingerprint: Option<String>,
    pub sidecar_fingerprint: Option<String>,
    pub json_sidecar_path: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub capture_timestamp: Option<String>,
    pub exif_datetime_original: Option<String>,
    pub exif_datetime_digitized: Option<String>,
    pub exif_gps_latitude: Option<f64>,
    pub exif_gps_longitude: Option<f64>,
    pub exif_gps_altitude: Option<f64>,
    pub exif_camera_make: Option<String>,
    pub exif_camera_model: Option<String>,
    pub exif_lens_make: Option<String>,
    pub exif_lens_model: Option<String>,
    pub exif_focal_length: Option<f64>,
    pub exif_f_number: Option<f64>,
    pub exif_exposure_time: Option<String>,
    pub exif_iso: Option<i64>,
    pub exif_orientation: Option<i64>,
    pub google_description: Option<String>,
    pub google_geo_latitude: Option<f64>,
    pub google_geo_longitude: Option<f64>,
    pub google_geo_altitude: Option<f64>,
    /// Ordered people names from the sidecar; stored via the people DAL,
    /// not as a column.
    pub people: Vec<String>,
    pub scan_run_id: String,
}

/// The subset of columns read back for change detection and reporting.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaItemRow {
    pub media_item_id: String,
    pub relative_path: String,
    pub album_id: String,
    pub title: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub crc32: Option<String>,
    pub content_fingerprint: Option<String>,
    pub sidecar_fingerprint: Option<String>,
    pub json_sidecar_path: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub capture_timestamp: Option<String>,
    pub status: String,
    pub first_seen_timestamp: String,
    pub last_seen_timestamp: String,
    pub scan_run_id: Option<String>,
}

pub async fn insert_media_item(
    conn: &mut SqliteConnection,
    record: &MediaItemRecord,
    first_seen: &str,
    last_seen: &str,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/media_items/insert.sql"))
        .bind(&record.media_item_id)
        .bind(&record.relative_path)
        .bind(&record.album_id)
        .bind(&record.title)
        .bind(&record.mime_type)
        .bind(record.file_size)
        .bind(&record.crc32)
        .bind(&record.content_fingerprint)
        .bind(&record.sidecar_fingerprint)
        .bind(&record.json_sidecar_path)
        .bind(record.width)
        .bind(record.height)
        .bind(record.duration_seconds)
        .bind(record.frame_rate)
        .bind(&record.capture_timestamp)
        .bind(&record.exif_datetime_original)
        .bind(&record.exif_datetime_digitized)
        .bind(record.exif_gps_latitude)
        .bind(record.exif_gps_longitude)
        .bind(record.exif_gps_altitude)
        .bind(&record.exif_camera_make)
        .bind(&record.exif_camera_model)
        .bind(&record.exif_lens_make)
        .bind(&record.exif_lens_model)
        .bind(record.exif_focal_length)
        .bind(record.exif_f_number)
        .bind(&record.exif_exposure_time)
        .bind(record.exif_iso)
        .bind(record.exif_orientation)
        .bind(&record.google_description)
        .bind(record.google_geo_latitude)
        .bind(record.google_geo_longitude)
        .bind(record.google_geo_altitude)
        .bind(first_seen)
        .bind(last_seen)
        .bind(&record.scan_run_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get_media_item_by_path(
    conn: &mut SqliteConnection,
    relative_path: &str,
) -> anyhow::Result<Option<MediaItemRow>> {
    let row = sqlx::query_as(include_str!("../../queries/media_items/get_by_path.sql"))
        .bind(relative_path)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// The id and first-seen stamp of an existing row, if any. Used by the
/// writer to preserve identity across a replace.
pub async fn get_identity_by_path(
    conn: &mut SqliteConnection,
    relative_path: &str,
) -> anyhow::Result<Option<(String, String)>> {
    let row = sqlx::query_as(include_str!(
        "../../queries/media_items/get_identity_by_path.sql"
    ))
    .bind(relative_path)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// True iff a row exists at `relative_path` whose fingerprints both match,
/// with NULL matching NULL on the sidecar side.
pub async fn check_file_unchanged(
    conn: &mut SqliteConnection,
    relative_path: &str,
    content_fingerprint: Option<&str>,
    sidecar_fingerprint: Option<&str>,
) -> anyhow::Result<bool> {
    let (count,): (i64,) = sqlx::query_as(include_str!(
        "../../queries/media_items/check_unchanged.sql"
    ))
    .bind(relative_path)
    .bind(content_fingerprint)
    .bind(sidecar_fingerprint)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// The unchanged fast path: refresh sighting info, touch nothing else.
pub async fn mark_seen(
    conn: &mut SqliteConnection,
    relative_path: &str,
    last_seen: &str,
    scan_run_id: &str,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/media_items/mark_seen.sql"))
        .bind(last_seen)
        .bind(scan_run_id)
        .bind(relative_path)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_by_path(
    conn: &mut SqliteConnection,
    relative_path: &str,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/media_items/delete_by_path.sql"))
        .bind(relative_path)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_missing_except(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
) -> anyhow::Result<u64> {
    let result = sqlx::query(include_str!("../../queries/media_items/mark_missing.sql"))
        .bind(scan_run_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_media_items(conn: &mut SqliteConnection) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(include_str!("../../queries/media_items/count.sql"))
        .fetch_one(conn)
        .await?;
    Ok(count)
}
