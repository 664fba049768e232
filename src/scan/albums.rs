use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::errors::ScanError;
use crate::mime::{detect_mime, is_image_mime, is_video_mime, should_skip_file};
use crate::paths::{album_id_for_path, normalize_path, relative_to};

static YEAR_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^photos from (\d{4})$").unwrap());

/// A folder classified for the catalog. `metadata_error` carries a parse
/// failure that should become a `processing_errors` row; the album itself
/// still exists with folder-name fallbacks.
#[derive(Debug, Clone)]
pub struct AlbumInfo {
    pub album_id: String,
    pub album_folder_path: String,
    pub title: String,
    pub description: Option<String>,
    pub access_level: Option<String>,
    pub creation_timestamp: Option<String>,
    pub is_user_album: bool,
    pub metadata_error: Option<ScanError>,
}

#[derive(Debug, Deserialize)]
struct RawAlbumMetadata {
    title: Option<String>,
    description: Option<String>,
    access: Option<String>,
    date: Option<RawAlbumDate>,
}

#[derive(Debug, Deserialize)]
struct RawAlbumDate {
    timestamp: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AlbumMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub access_level: Option<String>,
    pub creation_timestamp: Option<String>,
}

/// Parse an album-level `metadata.json`. Invalid JSON or an unreadable file
/// is a parse error; the caller decides on the fallback.
pub fn parse_album_metadata(path: &Utf8Path) -> Result<AlbumMetadata, ScanError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ScanError::Parse(format!("failed to read {path}: {e}")))?;
    let parsed: RawAlbumMetadata = serde_json::from_str(&raw)
        .map_err(|e| ScanError::Parse(format!("invalid JSON in {path}: {e}")))?;

    let creation_timestamp = parsed
        .date
        .and_then(|d| d.timestamp)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339());

    Ok(AlbumMetadata {
        title: parsed.title.filter(|t| !t.is_empty()),
        description: parsed.description.filter(|d| !d.is_empty()),
        access_level: parsed.access.filter(|a| !a.is_empty()),
        creation_timestamp,
    })
}

/// Year-album detection for folders Takeout names `Photos from YYYY`.
pub fn extract_year_from_folder(folder_name: &str) -> Option<i32> {
    let caps = YEAR_FOLDER.captures(folder_name)?;
    let year: i32 = caps[1].parse().ok()?;
    (1900..=2100).contains(&year).then_some(year)
}

/// Walk every directory under `root` and classify it. The root itself is
/// included only when media files sit directly in it, so that their album
/// foreign key resolves.
pub fn discover_albums(root: &Utf8Path) -> Vec<AlbumInfo> {
    let mut albums = Vec::new();

    if !root.is_dir() {
        warn!("album discovery: {root} is not a directory");
        return albums;
    }

    let mut visited: FxHashSet<Utf8PathBuf> = FxHashSet::default();
    let mut stack: Vec<Utf8PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("failed to read directory {dir}: {e}");
                continue;
            }
        };

        let mut has_root_media = false;
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                warn!("skipping non-UTF-8 path under {dir}");
                continue;
            };

            if path.is_dir() {
                stack.push(path.clone());
                albums.push(classify_album(&path, root));
            } else if dir == *root && !has_root_media {
                has_root_media = is_media_file(&path);
            }
        }

        if dir == *root && has_root_media {
            albums.push(classify_album(root, root));
        }
    }

    albums
}

fn is_media_file(path: &Utf8Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    if should_skip_file(name) || name.ends_with(".json") {
        return false;
    }
    match detect_mime(path) {
        Ok(mime) => is_image_mime(&mime) || is_video_mime(&mime),
        Err(_) => false,
    }
}

fn classify_album(dir: &Utf8Path, root: &Utf8Path) -> AlbumInfo {
    let folder_path = if dir == root {
        ".".to_string()
    } else {
        relative_to(dir, root)
    };
    let folder_name = dir.file_name().unwrap_or(".").to_string();
    let folder_name = normalize_path(&folder_name);

    let mut info = AlbumInfo {
        album_id: album_id_for_path(&folder_path).to_string(),
        album_folder_path: folder_path,
        title: folder_name.clone(),
        description: None,
        access_level: None,
        creation_timestamp: None,
        is_user_album: false,
        metadata_error: None,
    };

    let metadata_path = dir.join("metadata.json");
    if !metadata_path.is_file() {
        if let Some(year) = extract_year_from_folder(&folder_name) {
            debug!("{} is a year album ({year})", info.album_folder_path);
        }
        return info;
    }

    match parse_album_metadata(&metadata_path) {
        Ok(meta) => {
            info.is_user_album = true;
            if let Some(title) = meta.title {
                info.title = title;
            }
            info.description = meta.description;
            info.access_level = meta.access_level;
            info.creation_timestamp = meta.creation_timestamp;
        }
        Err(e) => {
            // fall back to the folder name; the error still gets stored
            warn!("album metadata unusable for {dir}: {e}");
            info.metadata_error = Some(e);
        }
    }

    info
}
