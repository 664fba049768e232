use std::fs::File;
use std::io::Read;

use camino::Utf8Path;

use crate::errors::ScanError;

/// Reported when the leading bytes match no known signature.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// System and editor droppings that are never media, matched case-insensitively.
const SKIP_NAMES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store"];

const SKIP_SUFFIXES: &[&str] = &[".tmp", ".temp", ".bak", ".cache"];

/// Sniff the MIME type from the file's leading bytes. Extension is ignored;
/// a renamed `.jpg` that is really a PNG reports `image/png`.
pub fn detect_mime(path: &Utf8Path) -> Result<String, ScanError> {
    let mut file = File::open(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    // infer needs at most a few KiB of header for every supported matcher
    let mut header = [0u8; 8192];
    let mut filled = 0;
    loop {
        let n = file
            .read(&mut header[filled..])
            .map_err(|e| ScanError::from_io(e, path.as_str()))?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == header.len() {
            break;
        }
    }

    Ok(infer::get(&header[..filled])
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string()))
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_video_mime(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Whether discovery should ignore this file name outright. Dotfiles are NOT
/// skipped as a class: Takeout emits valid media like `.facebook_12345.jpg`.
pub fn should_skip_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();

    if SKIP_NAMES.contains(&lower.as_str()) {
        return true;
    }

    SKIP_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, camino::Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("file.bin")).unwrap();
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn detects_jpeg_from_magic_bytes() {
        let (_dir, path) = write_temp(b"\xff\xd8\xff\xe0\x00\x10JFIF\x00");
        assert_eq!(detect_mime(&path).unwrap(), "image/jpeg");
    }

    #[test]
    fn detects_png_from_magic_bytes() {
        let (_dir, path) = write_temp(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        assert_eq!(detect_mime(&path).unwrap(), "image/png");
    }

    #[test]
    fn detects_mp4_from_ftyp_box() {
        let (_dir, path) = write_temp(b"\x00\x00\x00\x18ftypmp41\x00\x00\x00\x00mp41isom");
        assert_eq!(detect_mime(&path).unwrap(), "video/mp4");
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        let (_dir, path) = write_temp(b"not a recognized signature");
        assert_eq!(detect_mime(&path).unwrap(), OCTET_STREAM);
    }

    #[test]
    fn empty_file_is_octet_stream() {
        let (_dir, path) = write_temp(b"");
        assert_eq!(detect_mime(&path).unwrap(), OCTET_STREAM);
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = camino::Utf8Path::new("/nonexistent/photo.jpg");
        assert!(detect_mime(path).is_err());
    }

    #[test]
    fn family_predicates_are_exact_prefix_matches() {
        assert!(is_image_mime("image/jpeg"));
        assert!(is_video_mime("video/mp4"));
        assert!(!is_image_mime("IMAGE/JPEG"));
        assert!(!is_video_mime(" video/mp4"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn skip_rules_cover_system_files_and_temp_suffixes() {
        assert!(should_skip_file("Thumbs.db"));
        assert!(should_skip_file("THUMBS.DB"));
        assert!(should_skip_file("desktop.ini"));
        assert!(should_skip_file(".DS_Store"));
        assert!(should_skip_file("upload.tmp"));
        assert!(should_skip_file("photo.jpg.bak"));
        // dotfiles are legitimate media names in Takeout exports
        assert!(!should_skip_file(".facebook_1234.jpg"));
        assert!(!should_skip_file("IMG_0001.jpg"));
    }
}
