//! FastMovieMaker Core Error Definitions
//!
//! Defines error types used throughout the crate. Subsystems with a rich
//! failure surface (process running, export, TTS) keep their own enums and
//! convert into `CoreError` at the API boundary.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Time / Input Errors
    // =========================================================================
    #[error("Invalid timecode '{input}': expected {expected}")]
    InvalidTimecode { input: String, expected: String },

    // =========================================================================
    // Model Errors
    // =========================================================================
    #[error("Segment overlaps an existing segment ({start_ms}~{end_ms}ms)")]
    Overlap { start_ms: i64, end_ms: i64 },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Index not found: {0}")]
    NotFound(usize),

    #[error("Track is locked")]
    TrackLocked,

    #[error("Source position is contained by more than one clip; a clip hint is required")]
    AmbiguousSource,

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    #[error("Malformed project JSON: {0}")]
    MalformedJson(String),

    #[error("Unsupported project version {found} (newest known: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Project schema violation: {0}")]
    SchemaViolation(String),

    #[error("Referenced file missing: {0}")]
    ReferencedFileMissing(String),

    // =========================================================================
    // Command Errors
    // =========================================================================
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // =========================================================================
    // Subsystem Errors
    // =========================================================================
    #[error(transparent)]
    Process(#[from] crate::process::ProcessError),

    #[error(transparent)]
    Export(#[from] crate::render::ExportError),

    #[error(transparent)]
    Tts(#[from] crate::workers::tts::TtsError),

    // =========================================================================
    // Cache Errors (non-fatal: callers fall back to the un-cached path)
    // =========================================================================
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    // =========================================================================
    // IO
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidTimecode {
            input: "bad".to_string(),
            expected: "MM:SS.mmm".to_string(),
        };
        assert!(err.to_string().contains("bad"));

        let err = CoreError::Overlap {
            start_ms: 500,
            end_ms: 1500,
        };
        assert!(err.to_string().contains("500"));

        let err = CoreError::UnsupportedVersion {
            found: 9,
            supported: 4,
        };
        assert!(err.to_string().contains('9'));
    }
}
