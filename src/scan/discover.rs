use std::fs;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, warn};

use crate::errors::{ErrorType, ScanError};
use crate::matcher::{
    TIMESTAMP_TOLERANCE_SECONDS, match_sidecar_by_metadata, sidecar_candidates,
};
use crate::mime::{detect_mime, is_image_mime, is_video_mime, should_skip_file};
use crate::paths::relative_to;
use crate::scan::tools::ToolAvailability;
use crate::scan::{FailureRecord, WorkerMsg};

/// Album-level metadata files, which are never media and never sidecars.
static ALBUM_METADATA_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^metadata(\(\d+\))?\.json$").unwrap());

/// One unit of work for the CPU pool: a media file, its folder, and the
/// sidecar the matcher paired with it.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub file_path: Utf8PathBuf,
    pub relative_path: String,
    pub album_folder_path: String,
    pub json_sidecar_path: Option<Utf8PathBuf>,
    pub json_sidecar_relative: Option<String>,
    pub file_size: u64,
}

/// What the walk learned beyond the streamed tasks.
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    pub total_files: u64,
    pub unpaired_sidecars: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
    pub tools: ToolAvailability,
}

/// Recursive walk over the media root. Tasks stream through `task_tx` as
/// each folder is paired, so workers start before the walk finishes.
/// Unreadable directories are reported and skipped, never fatal.
pub fn discover(
    root: &Utf8Path,
    options: DiscoveryOptions,
    task_tx: Sender<FileTask>,
    failure_tx: Sender<WorkerMsg>,
    stop: Arc<AtomicBool>,
) -> DiscoveryStats {
    let mut stats = DiscoveryStats::default();

    if !root.is_dir() {
        error!("media root {root} is not a directory");
        return stats;
    }

    let mut visited: FxHashSet<Utf8PathBuf> = FxHashSet::default();
    let mut stack: Vec<Utf8PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if stop.load(Ordering::Relaxed) {
            debug!("discovery stopping early");
            break;
        }
        if !visited.insert(dir.clone()) {
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("failed to read directory {dir}: {e}");
                let failure = FailureRecord {
                    relative_path: relative_to(&dir, root),
                    error_type: ErrorType::Discovery,
                    error: ScanError::from_io(e, dir.as_str()),
                };
                let _ = failure_tx.blocking_send(WorkerMsg::Failure(failure));
                continue;
            }
        };

        let mut media_files: Vec<Utf8PathBuf> = Vec::new();
        let mut json_files: Vec<Utf8PathBuf> = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("failed to read directory entry in {dir}: {e}");
                    continue;
                }
            };
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                warn!("skipping non-UTF-8 path under {dir}");
                continue;
            };

            if path.is_dir() {
                stack.push(path);
                continue;
            }

            let Some(name) = path.file_name() else { continue };
            if should_skip_file(name) {
                continue;
            }

            if name.to_lowercase().ends_with(".json") {
                if !ALBUM_METADATA_NAME.is_match(name) {
                    json_files.push(path);
                }
                continue;
            }

            match detect_mime(&path) {
                Ok(mime) if is_image_mime(&mime) || is_video_mime(&mime) => {
                    media_files.push(path);
                }
                Ok(_) => {} // not media, not an error
                Err(e) => {
                    warn!("could not sniff {path}: {e}");
                    let failure = FailureRecord {
                        relative_path: relative_to(&path, root),
                        error_type: ErrorType::Discovery,
                        error: e,
                    };
                    let _ = failure_tx.blocking_send(WorkerMsg::Failure(failure));
                }
            }
        }

        // deterministic pairing regardless of readdir order
        media_files.sort();
        json_files.sort();

        let (pairs, unpaired) = pair_sidecars(&media_files, &json_files, &options);

        for sidecar in unpaired {
            let rel = relative_to(&sidecar, root);
            warn!("unpaired sidecar: {rel}");
            stats.unpaired_sidecars.push(rel);
        }

        let album_folder_path = if dir == *root {
            ".".to_string()
        } else {
            relative_to(&dir, root)
        };

        for media_path in media_files {
            if stop.load(Ordering::Relaxed) {
                return stats;
            }

            let file_size = match fs::metadata(&media_path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    let failure = FailureRecord {
                        relative_path: relative_to(&media_path, root),
                        error_type: ErrorType::Discovery,
                        error: ScanError::from_io(e, media_path.as_str()),
                    };
                    let _ = failure_tx.blocking_send(WorkerMsg::Failure(failure));
                    continue;
                }
            };

            let sidecar = pairs.get(&media_path).cloned();
            let task = FileTask {
                relative_path: relative_to(&media_path, root),
                album_folder_path: album_folder_path.clone(),
                json_sidecar_relative: sidecar.as_deref().map(|s| relative_to(s, root)),
                json_sidecar_path: sidecar,
                file_path: media_path,
                file_size,
            };

            stats.total_files += 1;
            if task_tx.blocking_send(task).is_err() {
                // receiver gone, the scan is over
                return stats;
            }
        }
    }

    stats
}

/// Pair each media file in a folder with at most one sidecar. Filename
/// patterns first; timestamp fallback for whatever is left. Returns the
/// pairing and the sidecars nothing claimed.
fn pair_sidecars(
    media_files: &[Utf8PathBuf],
    json_files: &[Utf8PathBuf],
    options: &DiscoveryOptions,
) -> (FxHashMap<Utf8PathBuf, Utf8PathBuf>, Vec<Utf8PathBuf>) {
    let mut by_name: FxHashMap<&str, &Utf8PathBuf> = json_files
        .iter()
        .filter_map(|p| p.file_name().map(|name| (name, p)))
        .collect();

    let mut pairs: FxHashMap<Utf8PathBuf, Utf8PathBuf> = FxHashMap::default();

    for media in media_files {
        let Some(media_name) = media.file_name() else {
            continue;
        };
        for candidate in sidecar_candidates(media_name) {
            if let Some(sidecar) = by_name.remove(candidate.as_str()) {
                pairs.insert(media.clone(), sidecar.clone());
                break;
            }
        }
    }

    let mut claimed: FxHashSet<Utf8PathBuf> = pairs.values().cloned().collect();
    let mut unpaired: Vec<Utf8PathBuf> = Vec::new();

    for sidecar in json_files {
        if claimed.contains(sidecar) {
            continue;
        }

        let unmatched: Vec<&Utf8Path> = media_files
            .iter()
            .filter(|m| !pairs.contains_key(*m))
            .map(|m| m.as_path())
            .collect();

        let matched = match_sidecar_by_metadata(
            sidecar,
            &unmatched,
            TIMESTAMP_TOLERANCE_SECONDS,
            options.use_exiftool,
            options.use_ffprobe,
            &options.tools,
        );

        match matched {
            Some(idx) => {
                claimed.insert(sidecar.clone());
                pairs.insert(unmatched[idx].to_path_buf(), sidecar.clone());
            }
            None => unpaired.push(sidecar.clone()),
        }
    }

    (pairs, unpaired)
}
