pub mod albums;
pub mod discover;
pub mod progress;
pub mod tools;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};

use crate::db;
use crate::db::albums::AlbumRow;
use crate::db::media_items::MediaItemRecord;
use crate::db::{media_items, people, processing_errors, scan_runs};
use crate::errors::{ErrorCategory, ErrorType, ScanError};
use crate::settings::Settings;
use discover::{DiscoveryOptions, DiscoveryStats, FileTask};
use progress::{DEFAULT_LOG_INTERVAL, ProgressTracker};
use worker::WorkerContext;

/// A per-path failure on its way to the `processing_errors` table.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub relative_path: String,
    pub error_type: ErrorType,
    pub error: ScanError,
}

/// What crosses the results queue: a finished record or a failure. Plain
/// data either way; the database stays on the writer's side.
#[derive(Debug)]
pub enum WorkerMsg {
    Item(Box<MediaItemRecord>),
    Failure(FailureRecord),
}

/// End-of-scan accounting, logged and handed to the caller for the exit
/// code decision.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub scan_run_id: String,
    pub status: String,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub errors: u64,
    pub albums_seen: u64,
    pub unpaired_sidecars: u64,
    pub duration_seconds: f64,
    pub errors_by_category: Vec<(String, i64)>,
}

/// Run one complete scan: open the catalog, pre-pass albums, stream
/// discovery through the worker pool into the single writer, then finalize
/// the scan run. `stop` is the cooperative cancellation flag; when it goes
/// high the producer stops, workers drain, and the run finalizes as failed.
pub async fn run_scan(
    settings: &Settings,
    strict: bool,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<ScanSummary> {
    let scanner = settings.scanner.clone();
    let started = std::time::Instant::now();

    let pool = db::open(&scanner.database_path)
        .await
        .with_context(|| format!("could not open catalog at {}", scanner.database_path))?;
    db::run_migrations(&pool)
        .await
        .context("schema migration failed")?;

    let tools = tools::probe_tools(scanner.use_ffprobe, scanner.use_exiftool);
    if strict {
        if scanner.use_ffprobe && !tools.ffprobe {
            bail!("{}", ScanError::ToolNotFound("ffprobe".into()));
        }
        if scanner.use_exiftool && !tools.exiftool {
            bail!("{}", ScanError::ToolNotFound("exiftool".into()));
        }
    }

    let mut conn = pool.acquire().await?;
    let scan_run_id = scan_runs::create_scan_run(&mut conn).await?;
    info!("scan {scan_run_id} started for {}", scanner.target_media_path);

    // album pre-pass: every media row inserted later needs its album row
    let albums = {
        let root = scanner.target_media_path.clone();
        spawn_blocking(move || albums::discover_albums(&root))
            .await
            .expect("album discovery panicked")
    };
    let albums_seen = albums.len() as u64;
    for album in &albums {
        db::albums::upsert_album(
            &mut conn,
            &AlbumRow {
                album_id: album.album_id.clone(),
                album_folder_path: album.album_folder_path.clone(),
                title: Some(album.title.clone()),
                description: album.description.clone(),
                access_level: album.access_level.clone(),
                creation_timestamp: album.creation_timestamp.clone(),
                is_user_album: album.is_user_album,
                status: "present".to_string(),
                scan_run_id: Some(scan_run_id.clone()),
            },
        )
        .await?;

        if let Some(err) = &album.metadata_error {
            processing_errors::insert_error(
                &mut conn,
                &scan_run_id,
                &format!("{}/metadata.json", album.album_folder_path),
                ErrorType::Album,
                err.category(),
                &err.to_string(),
            )
            .await?;
        }
    }
    drop(conn);
    info!("album pre-pass registered {albums_seen} albums");

    let (task_tx, task_rx) = mpsc::channel::<FileTask>(scanner.queue_maxsize);
    let (result_tx, mut result_rx) = mpsc::channel::<WorkerMsg>(scanner.queue_maxsize);

    // discovery producer
    let mut discover_handle = {
        let root = scanner.target_media_path.clone();
        let options = DiscoveryOptions {
            use_exiftool: scanner.use_exiftool,
            use_ffprobe: scanner.use_ffprobe,
            tools,
        };
        let failure_tx = result_tx.clone();
        let stop = Arc::clone(&stop);
        spawn_blocking(move || discover::discover(&root, options, task_tx, failure_tx, stop))
    };

    // CPU worker pool; a shared receiver hands each task to exactly one worker
    let task_rx_shared = Arc::new(Mutex::new(task_rx));
    for _ in 0..scanner.worker_processes {
        let task_rx = Arc::clone(&task_rx_shared);
        let result_tx = result_tx.clone();
        let scan_run_id = scan_run_id.clone();
        let ctx = WorkerContext {
            use_exiftool: scanner.use_exiftool,
            use_ffprobe: scanner.use_ffprobe,
            tools,
        };
        spawn_blocking(move || {
            loop {
                let task = {
                    let mut rx = task_rx.lock().expect("task receiver mutex poisoned");
                    rx.blocking_recv()
                };
                let Some(task) = task else {
                    break; // queue closed, discovery is done
                };
                for msg in worker::process_file(&task, &ctx, &scan_run_id) {
                    if result_tx.blocking_send(msg).is_err() {
                        return;
                    }
                }
            }
        });
    }
    // workers and discovery hold the remaining senders
    drop(result_tx);

    // writer: the only database mutator, batching commits under WAL
    let mut progress = ProgressTracker::new(DEFAULT_LOG_INTERVAL);
    let mut stats: Option<DiscoveryStats> = None;
    let mut discovery_complete = false;
    let mut tx = pool.begin().await.context("could not begin scan transaction")?;
    let mut items_in_tx: usize = 0;

    loop {
        tokio::select! {
            result = &mut discover_handle, if !discovery_complete => {
                let discovered = result.expect("discovery task panicked");
                progress.set_total(discovered.total_files);
                info!("discovery finished: {} media files", discovered.total_files);
                stats = Some(discovered);
                discovery_complete = true;
            }

            msg = result_rx.recv() => {
                let Some(msg) = msg else {
                    // pipeline drained; the batch transaction must not be
                    // left holding the writer connection
                    finish_batch(&mut *tx, &scan_run_id, &progress).await;
                    tx.commit().await.context("final batch commit failed")?;
                    break;
                };

                match msg {
                    WorkerMsg::Item(record) => {
                        let bytes = record.file_size.max(0) as u64;
                        match write_record(&mut *tx, *record).await {
                            Ok(()) => progress.record_file(bytes),
                            Err((path, e)) => {
                                error!("failed to write record for {path}: {e}");
                                progress.record_error();
                                let _ = processing_errors::insert_error(
                                    &mut *tx,
                                    &scan_run_id,
                                    &path,
                                    ErrorType::MediaFile,
                                    ErrorCategory::IoError,
                                    &e.to_string(),
                                )
                                .await;
                            }
                        }
                    }
                    WorkerMsg::Failure(failure) => {
                        warn!(
                            "{}: {} ({})",
                            failure.relative_path,
                            failure.error,
                            failure.error_type.as_str()
                        );
                        progress.record_error();
                        let _ = processing_errors::insert_error(
                            &mut *tx,
                            &scan_run_id,
                            &failure.relative_path,
                            failure.error_type,
                            failure.error.category(),
                            &failure.error.to_string(),
                        )
                        .await;
                    }
                }

                items_in_tx += 1;
                if items_in_tx >= scanner.batch_size {
                    finish_batch(&mut *tx, &scan_run_id, &progress).await;
                    if let Err(e) = tx.commit().await {
                        error!("failed to commit scan batch: {e:?}");
                    }
                    tx = pool.begin().await.context("could not begin scan transaction")?;
                    items_in_tx = 0;
                }
            }
        }
    }

    if !discovery_complete {
        stats = Some(discover_handle.await.expect("discovery task panicked"));
    }
    let stats = stats.expect("discovery stats were not returned");

    let summary = finalize(
        &pool,
        &scan_run_id,
        &progress,
        &stats,
        albums_seen,
        stop.load(Ordering::Relaxed),
        started.elapsed().as_secs_f64(),
    )
    .await?;

    Ok(summary)
}

/// Fold the running counters into the scan_runs row before a commit, so a
/// crash mid-scan still leaves plausible numbers behind.
async fn finish_batch(conn: &mut SqliteConnection, scan_run_id: &str, progress: &ProgressTracker) {
    if let Err(e) = scan_runs::update_counters(
        conn,
        scan_run_id,
        progress.files_processed(),
        progress.errors(),
        progress.bytes_processed(),
    )
    .await
    {
        error!("failed to update scan counters: {e:?}");
    }
}

/// Apply one worker record. Unchanged files only refresh their sighting;
/// changed files are replaced in place, keeping the row id and first-seen
/// stamp; new files are inserted.
async fn write_record(
    conn: &mut SqliteConnection,
    mut record: MediaItemRecord,
) -> Result<(), (String, anyhow::Error)> {
    let path = record.relative_path.clone();
    let result: anyhow::Result<()> = async {
        let now = Utc::now().to_rfc3339();

        let unchanged = media_items::check_file_unchanged(
            conn,
            &record.relative_path,
            record.content_fingerprint.as_deref(),
            record.sidecar_fingerprint.as_deref(),
        )
        .await?;

        if unchanged {
            media_items::mark_seen(conn, &record.relative_path, &now, &record.scan_run_id)
                .await?;
            return Ok(());
        }

        let first_seen =
            match media_items::get_identity_by_path(conn, &record.relative_path).await? {
                Some((existing_id, first_seen)) => {
                    media_items::delete_by_path(conn, &record.relative_path).await?;
                    record.media_item_id = existing_id;
                    first_seen
                }
                None => now.clone(),
            };

        media_items::insert_media_item(conn, &record, &first_seen, &now).await?;
        people::replace_people_tags(conn, &record.media_item_id, &record.people).await?;
        Ok(())
    }
    .await;

    result.map_err(|e| (path, e))
}

#[allow(clippy::too_many_arguments)]
async fn finalize(
    pool: &SqlitePool,
    scan_run_id: &str,
    progress: &ProgressTracker,
    stats: &DiscoveryStats,
    albums_seen: u64,
    cancelled: bool,
    duration_seconds: f64,
) -> anyhow::Result<ScanSummary> {
    let mut conn = pool.acquire().await?;

    if cancelled {
        warn!("scan {scan_run_id} was interrupted; missing-status pass skipped");
    } else {
        let missing_items = media_items::mark_missing_except(&mut conn, scan_run_id).await?;
        let missing_albums = db::albums::mark_missing_except(&mut conn, scan_run_id).await?;
        if missing_items > 0 || missing_albums > 0 {
            info!("marked {missing_items} media items and {missing_albums} albums missing");
        }
    }

    scan_runs::update_counters(
        &mut conn,
        scan_run_id,
        progress.files_processed(),
        progress.errors(),
        progress.bytes_processed(),
    )
    .await?;

    let status = if cancelled { "failed" } else { "completed" };
    scan_runs::complete_scan_run(&mut conn, scan_run_id, status).await?;

    let errors_by_category = processing_errors::count_by_category(&mut conn, scan_run_id).await?;

    progress.log_summary();
    if !stats.unpaired_sidecars.is_empty() {
        warn!("{} sidecars could not be paired", stats.unpaired_sidecars.len());
    }
    for (category, count) in &errors_by_category {
        info!("errors[{category}] = {count}");
    }

    Ok(ScanSummary {
        scan_run_id: scan_run_id.to_string(),
        status: status.to_string(),
        files_processed: progress.files_processed(),
        bytes_processed: progress.bytes_processed(),
        errors: progress.errors(),
        albums_seen,
        unpaired_sidecars: stats.unpaired_sidecars.len() as u64,
        duration_seconds,
        errors_by_category,
    })
}
