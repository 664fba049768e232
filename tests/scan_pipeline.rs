use std::fs;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use camino::{Utf8Path, Utf8PathBuf};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use takeout_catalog::scan::{ScanSummary, run_scan};
use takeout_catalog::settings::Settings;

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

fn write_jpeg(path: &Utf8Path, width: u32, height: u32, shade: u8) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade / 2, 7]));
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

fn settings_for(root: &Utf8Path, database: &Utf8Path) -> Settings {
    let mut settings = Settings::default();
    settings.scanner.target_media_path = root.to_path_buf();
    settings.scanner.database_path = database.to_path_buf();
    settings.scanner.worker_processes = 2;
    settings.scanner.queue_maxsize = 64;
    settings.scanner.batch_size = 10;
    settings
}

async fn scan(settings: &Settings) -> ScanSummary {
    let stop = Arc::new(AtomicBool::new(false));
    run_scan(settings, false, stop).await.expect("scan failed")
}

async fn open_catalog(path: &Utf8Path) -> SqlitePool {
    let options = SqliteConnectOptions::new().filename(path);
    SqlitePool::connect_with(options).await.unwrap()
}

#[derive(Debug, sqlx::FromRow)]
struct ItemProbe {
    media_item_id: String,
    relative_path: String,
    album_id: String,
    mime_type: Option<String>,
    crc32: Option<String>,
    content_fingerprint: Option<String>,
    sidecar_fingerprint: Option<String>,
    json_sidecar_path: Option<String>,
    capture_timestamp: Option<String>,
    status: String,
    first_seen_timestamp: String,
    last_seen_timestamp: String,
    scan_run_id: Option<String>,
}

async fn fetch_item(pool: &SqlitePool, relative_path: &str) -> ItemProbe {
    sqlx::query_as(
        "SELECT media_item_id, relative_path, album_id, mime_type, crc32,
                content_fingerprint, sidecar_fingerprint, json_sidecar_path,
                capture_timestamp, status, first_seen_timestamp,
                last_seen_timestamp, scan_run_id
         FROM media_items WHERE relative_path = ?",
    )
    .bind(relative_path)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await.unwrap();
    n
}

#[tokio::test]
async fn single_jpeg_with_sidecar_lands_in_the_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");

    let album = root.join("Photos from 2021");
    write_jpeg(&album.join("IMG_20210615_143022.jpg"), 32, 24, 200);
    fs::write(
        album.join("IMG_20210615_143022.jpg.supplemental-metadata.json"),
        br#"{"title": "IMG_20210615_143022.jpg",
             "photoTakenTime": {"timestamp": "1623767422"}}"#,
    )
    .unwrap();

    let summary = scan(&settings_for(&root, &db)).await;
    assert_eq!(summary.status, "completed");
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.albums_seen, 1);
    assert_eq!(summary.unpaired_sidecars, 0);

    let pool = open_catalog(&db).await;

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM albums").await, 1);
    let (title, is_user): (String, bool) =
        sqlx::query_as("SELECT title, is_user_album FROM albums")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(title, "Photos from 2021");
    assert!(!is_user);

    let item = fetch_item(&pool, "Photos from 2021/IMG_20210615_143022.jpg").await;
    assert_eq!(item.mime_type.as_deref(), Some("image/jpeg"));
    assert_eq!(
        item.capture_timestamp.as_deref(),
        Some("2021-06-15T14:30:22+00:00")
    );
    assert_eq!(item.crc32.as_ref().unwrap().len(), 8);
    assert_eq!(item.content_fingerprint.as_ref().unwrap().len(), 64);
    assert!(item.sidecar_fingerprint.is_some());
    assert_eq!(
        item.json_sidecar_path.as_deref(),
        Some("Photos from 2021/IMG_20210615_143022.jpg.supplemental-metadata.json")
    );
    assert_eq!(item.status, "present");

    // the scan run row is finalized
    let (run_status, end): (String, Option<String>) =
        sqlx::query_as("SELECT status, end_timestamp FROM scan_runs")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(run_status, "completed");
    assert!(end.is_some());
}

#[tokio::test]
async fn rescan_without_changes_only_refreshes_sightings() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    write_jpeg(&root.join("A").join("one.jpg"), 16, 16, 40);
    write_jpeg(&root.join("A").join("two.jpg"), 16, 16, 90);

    let settings = settings_for(&root, &db);
    let first = scan(&settings).await;
    let pool = open_catalog(&db).await;
    let before = fetch_item(&pool, "A/one.jpg").await;

    let second = scan(&settings).await;
    assert_ne!(first.scan_run_id, second.scan_run_id);

    let after = fetch_item(&pool, "A/one.jpg").await;
    assert_eq!(before.media_item_id, after.media_item_id);
    assert_eq!(before.content_fingerprint, after.content_fingerprint);
    assert_eq!(before.first_seen_timestamp, after.first_seen_timestamp);
    assert_eq!(after.scan_run_id.as_deref(), Some(second.scan_run_id.as_str()));
    assert_eq!(after.status, "present");

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM media_items").await, 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM processing_errors").await, 0);
}

#[tokio::test]
async fn modified_file_changes_fingerprint_but_keeps_identity() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    let photo = root.join("A").join("photo.jpg");
    write_jpeg(&photo, 16, 16, 40);

    let settings = settings_for(&root, &db);
    scan(&settings).await;
    let pool = open_catalog(&db).await;
    let before = fetch_item(&pool, "A/photo.jpg").await;

    // overwrite with different pixels
    write_jpeg(&photo, 64, 48, 250);
    scan(&settings).await;

    let after = fetch_item(&pool, "A/photo.jpg").await;
    assert_ne!(before.content_fingerprint, after.content_fingerprint);
    assert_eq!(before.media_item_id, after.media_item_id);
    assert_eq!(before.first_seen_timestamp, after.first_seen_timestamp);
    assert_eq!(after.status, "present");
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM processing_errors").await, 0);
}

#[tokio::test]
async fn deleted_file_goes_missing_on_rescan() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    write_jpeg(&root.join("A").join("keep.jpg"), 16, 16, 40);
    write_jpeg(&root.join("A").join("remove.jpg"), 16, 16, 90);

    let settings = settings_for(&root, &db);
    scan(&settings).await;

    fs::remove_file(root.join("A").join("remove.jpg")).unwrap();
    scan(&settings).await;

    let pool = open_catalog(&db).await;
    let kept = fetch_item(&pool, "A/keep.jpg").await;
    let removed = fetch_item(&pool, "A/remove.jpg").await;
    assert_eq!(kept.status, "present");
    assert_eq!(removed.status, "missing");

    let (album_status,): (String,) = sqlx::query_as("SELECT status FROM albums")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(album_status, "present");
}

#[tokio::test]
async fn unicode_paths_are_stored_in_nfc_with_forward_slashes() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    write_jpeg(&root.join("Лис").join("DSC_3767.JPG"), 16, 16, 40);

    scan(&settings_for(&root, &db)).await;

    let pool = open_catalog(&db).await;
    let item = fetch_item(&pool, "Лис/DSC_3767.JPG").await;
    assert!(!item.relative_path.contains('\\'));

    let (folder,): (String,) = sqlx::query_as("SELECT album_folder_path FROM albums")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(folder, "Лис");

    // the media row points at that album
    let (album_id,): (String,) = sqlx::query_as("SELECT album_id FROM albums")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(item.album_id, album_id);
}

#[tokio::test]
async fn corrupt_sidecar_records_an_error_but_keeps_the_media() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    let album = root.join("A");
    write_jpeg(&album.join("photo.jpg"), 16, 16, 40);
    fs::write(album.join("photo.jpg.json"), b"{definitely not json").unwrap();

    let summary = scan(&settings_for(&root, &db)).await;
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.errors, 1);

    let pool = open_catalog(&db).await;
    let item = fetch_item(&pool, "A/photo.jpg").await;
    assert_eq!(item.status, "present");

    let (error_type, category): (String, String) =
        sqlx::query_as("SELECT error_type, error_category FROM processing_errors")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(error_type, "sidecar");
    assert_eq!(category, "parse_error");
}

#[tokio::test]
async fn people_tags_are_written_in_sidecar_order() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");
    let album = root.join("A");
    write_jpeg(&album.join("group.jpg"), 16, 16, 40);
    fs::write(
        album.join("group.jpg.json"),
        br#"{"people": [{"name": "Alice"}, {"name": "Bob"}, {"name": "Carol"}]}"#,
    )
    .unwrap();

    scan(&settings_for(&root, &db)).await;

    let pool = open_catalog(&db).await;
    let names: Vec<(String,)> = sqlx::query_as(
        "SELECT p.person_name
         FROM people_tags pt JOIN people p ON pt.person_id = p.person_id
         ORDER BY pt.tag_order",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    let names: Vec<&str> = names.iter().map(|(n,)| n.as_str()).collect();
    assert_eq!(names, ["Alice", "Bob", "Carol"]);
}

#[tokio::test]
async fn user_album_metadata_is_applied_and_bad_metadata_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");

    let vacation = root.join("Vacation");
    write_jpeg(&vacation.join("p.jpg"), 16, 16, 40);
    fs::write(
        vacation.join("metadata.json"),
        br#"{"title": "Summer 2023", "description": "beach",
             "access": "private", "date": {"timestamp": "1688169600"}}"#,
    )
    .unwrap();

    let broken = root.join("Broken");
    write_jpeg(&broken.join("q.jpg"), 16, 16, 90);
    fs::write(broken.join("metadata.json"), b"{nope").unwrap();

    let summary = scan(&settings_for(&root, &db)).await;
    assert_eq!(summary.files_processed, 2);

    let pool = open_catalog(&db).await;

    let (title, description, access, is_user): (String, Option<String>, Option<String>, bool) =
        sqlx::query_as(
            "SELECT title, description, access_level, is_user_album
             FROM albums WHERE album_folder_path = 'Vacation'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Summer 2023");
    assert_eq!(description.as_deref(), Some("beach"));
    assert_eq!(access.as_deref(), Some("private"));
    assert!(is_user);

    let (fallback_title, fallback_user): (String, bool) = sqlx::query_as(
        "SELECT title, is_user_album FROM albums WHERE album_folder_path = 'Broken'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(fallback_title, "Broken");
    assert!(!fallback_user);

    let (error_type,): (String,) = sqlx::query_as(
        "SELECT error_type FROM processing_errors WHERE relative_path LIKE 'Broken%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(error_type, "album");

    // media in the broken album is still catalogued
    let item = fetch_item(&pool, "Broken/q.jpg").await;
    assert_eq!(item.status, "present");
}

#[tokio::test]
async fn every_successful_record_becomes_a_row() {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8(tmp.path()).join("media");
    let db = utf8(tmp.path()).join("catalog.db");

    for album in ["A", "B", "C"] {
        for i in 0..7u8 {
            write_jpeg(&root.join(album).join(format!("img{i}.jpg")), 16, 16, i * 9 + 1);
        }
    }

    let summary = scan(&settings_for(&root, &db)).await;
    assert_eq!(summary.files_processed, 21);
    assert_eq!(summary.errors, 0);

    let pool = open_catalog(&db).await;
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM media_items").await, 21);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM albums").await, 3);

    // no two albums share a folder, no two items share a path
    assert_eq!(
        count(&pool, "SELECT COUNT(DISTINCT album_folder_path) FROM albums").await,
        3
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(DISTINCT relative_path) FROM media_items").await,
        21
    );
}
