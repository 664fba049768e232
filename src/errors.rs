use std::io::ErrorKind;

use thiserror::Error;

/// Everything that can go wrong while processing a single path. Per-file
/// failures are converted to rows in `processing_errors`, never panics.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("corrupted file: {0}")]
    Corrupted(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported format: {0}")]
    Unsupported(String),
    #[error("required tool not found: {0}")]
    ToolNotFound(String),
}

/// Storable category for a `processing_errors` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PermissionDenied,
    Corrupted,
    IoError,
    ParseError,
    UnsupportedFormat,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::Corrupted => "corrupted",
            ErrorCategory::IoError => "io_error",
            ErrorCategory::ParseError => "parse_error",
            ErrorCategory::UnsupportedFormat => "unsupported_format",
        }
    }
}

/// What kind of path the failure was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    MediaFile,
    Sidecar,
    Album,
    Discovery,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::MediaFile => "media_file",
            ErrorType::Sidecar => "sidecar",
            ErrorType::Album => "album",
            ErrorType::Discovery => "discovery",
        }
    }
}

impl ScanError {
    /// Classify an OS error against the path it occurred on.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            ErrorKind::PermissionDenied => {
                ScanError::PermissionDenied(format!("{path}: {err}"))
            }
            _ => ScanError::Io(format!("{path}: {err}")),
        }
    }

    pub fn from_json(err: serde_json::Error, path: &str) -> Self {
        ScanError::Parse(format!("{path}: {err}"))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ScanError::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            ScanError::Corrupted(_) => ErrorCategory::Corrupted,
            ScanError::Io(_) => ErrorCategory::IoError,
            ScanError::Parse(_) => ErrorCategory::ParseError,
            ScanError::Unsupported(_) => ErrorCategory::UnsupportedFormat,
            // tool_not_found has no category of its own in the store
            ScanError::ToolNotFound(_) => ErrorCategory::UnsupportedFormat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_by_kind() {
        let denied = std::io::Error::new(ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ScanError::from_io(denied, "a.jpg").category(),
            ErrorCategory::PermissionDenied
        );

        let missing = std::io::Error::new(ErrorKind::NotFound, "missing");
        assert_eq!(
            ScanError::from_io(missing, "a.jpg").category(),
            ErrorCategory::IoError
        );
    }

    #[test]
    fn json_errors_are_parse_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert_eq!(
            ScanError::from_json(err, "x.json").category(),
            ErrorCategory::ParseError
        );
    }

    #[test]
    fn tool_not_found_is_storable() {
        let err = ScanError::ToolNotFound("ffprobe".into());
        assert_eq!(err.category(), ErrorCategory::UnsupportedFormat);
    }

    #[test]
    fn categories_have_stable_names() {
        assert_eq!(ErrorCategory::PermissionDenied.as_str(), "permission_denied");
        assert_eq!(ErrorCategory::ParseError.as_str(), "parse_error");
        assert_eq!(ErrorType::Sidecar.as_str(), "sidecar");
    }
}
