use camino::Utf8Path;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Namespace for deriving album ids. Fixed forever: changing it would orphan
/// every album row in existing catalogs.
const ALBUM_NAMESPACE: Uuid = Uuid::from_u128(0x8e2f1d6a_43b0_4c84_9f3e_2d9a51c7b0e4);

/// Normalize a path for storage and comparison: Unicode NFC composition and
/// forward slashes. Every database lookup and queue record uses this form.
pub fn normalize_path(path: &str) -> String {
    path.nfc().collect::<String>().replace('\\', "/")
}

/// Deterministic album id: UUIDv5 of the normalized relative folder path.
/// Stable across scans, so rescans update the same row.
pub fn album_id_for_path(folder_path: &str) -> Uuid {
    Uuid::new_v5(&ALBUM_NAMESPACE, normalize_path(folder_path).as_bytes())
}

/// Relative path of `path` under `root`, normalized. Falls back to the full
/// path when `path` is not under `root` (should not happen during a walk).
pub fn relative_to(path: &Utf8Path, root: &Utf8Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => normalize_path(rel.as_str()),
        Err(_) => normalize_path(path.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let decomposed = "Лис/Cafe\u{0301}"; // combining acute accent
        let once = normalize_path(decomposed);
        assert_eq!(once, normalize_path(&once));
        assert!(!once.contains('\\'));
        assert!(once.contains('é'));
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(normalize_path(r"a\b\c.jpg"), "a/b/c.jpg");
    }

    #[test]
    fn album_id_is_deterministic_and_normalization_invariant() {
        let id1 = album_id_for_path("Photos from 2021");
        let id2 = album_id_for_path("Photos from 2021");
        assert_eq!(id1, id2);

        let composed = album_id_for_path("Cafe\u{301}");
        let precomposed = album_id_for_path("Café");
        assert_eq!(composed, precomposed);
    }

    #[test]
    fn distinct_paths_get_distinct_ids() {
        assert_ne!(album_id_for_path("a"), album_id_for_path("b"));
    }

    #[test]
    fn relative_to_strips_root() {
        let root = Utf8Path::new("/takeout/root");
        let path = Utf8Path::new("/takeout/root/Лис/DSC_3767.JPG");
        assert_eq!(relative_to(path, root), "Лис/DSC_3767.JPG");
    }
}
