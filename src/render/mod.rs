//! Export Renderer
//!
//! Consumes a full [`crate::model::ProjectState`] plus an output
//! descriptor and drives FFmpeg to produce a single file: multi-source
//! concat, subtitle burn-in, PIP overlays, text overlays, and mixed
//! audio with per-segment volumes.

pub mod export;
pub mod filter;

pub use export::{start_batch_export, start_export, ExportEngine, ExportProgress, ExportResult};
pub use filter::{build_filter_graph, FilterGraph};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::process::{ProcessError, VideoCodecKind};

// =============================================================================
// Errors
// =============================================================================

/// Export failure kinds.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not build filter graph: {0}")]
    FilterGraphBuildFailed(String),

    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("ffmpeg exited with code {code}: {stderr_tail}")]
    FfmpegExit { code: i32, stderr_tail: String },

    #[error("disk full while writing output")]
    DiskFull,

    #[error("export cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for ExportError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Cancelled => ExportError::Cancelled,
            ProcessError::NonZeroExit { code, stderr_tail } => {
                if stderr_tail.contains("No space left on device") {
                    ExportError::DiskFull
                } else {
                    ExportError::FfmpegExit { code, stderr_tail }
                }
            }
            other => ExportError::FfmpegExit {
                code: -1,
                stderr_tail: other.to_string(),
            },
        }
    }
}

// =============================================================================
// Output Descriptor
// =============================================================================

/// Output container formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Mp4,
    Mkv,
    Webm,
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
            Container::Webm => "webm",
        }
    }

    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "matroska",
            Container::Webm => "webm",
        }
    }
}

/// Audio policy for the output: how the video's own audio, the TTS
/// track, and the BGM are mixed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioPolicy {
    /// Gain for the primary video audio, in `[0.0, 1.0]`.
    pub video_gain: f32,
    /// Gain for the synthesized narration track, in `[0.0, 2.0]`.
    pub tts_gain: f32,
}

impl Default for AudioPolicy {
    fn default() -> Self {
        Self {
            video_gain: 1.0,
            tts_gain: 1.0,
        }
    }
}

/// One export job: where and how to render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub output_path: PathBuf,
    pub container: Container,
    pub codec: VideoCodecKind,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub audio: AudioPolicy,
}

impl ExportJob {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            container: Container::Mp4,
            codec: VideoCodecKind::H264,
            width: 1920,
            height: 1080,
            audio: AudioPolicy::default(),
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_mapping() {
        assert_eq!(Container::Mp4.extension(), "mp4");
        assert_eq!(Container::Mkv.ffmpeg_format(), "matroska");
        assert_eq!(Container::Webm.ffmpeg_format(), "webm");
    }

    #[test]
    fn test_process_error_mapping() {
        let err: ExportError = ProcessError::Cancelled.into();
        assert!(matches!(err, ExportError::Cancelled));

        let err: ExportError = ProcessError::NonZeroExit {
            code: 1,
            stderr_tail: "av_interleaved_write_frame(): No space left on device".to_string(),
        }
        .into();
        assert!(matches!(err, ExportError::DiskFull));

        let err: ExportError = ProcessError::NonZeroExit {
            code: 1,
            stderr_tail: "filter parse error".to_string(),
        }
        .into();
        assert!(matches!(err, ExportError::FfmpegExit { code: 1, .. }));
    }

    #[test]
    fn test_job_builder() {
        let job = ExportJob::new("/out/video.mp4")
            .with_resolution(1280, 720)
            .with_container(Container::Webm);
        assert_eq!(job.width, 1280);
        assert_eq!(job.container, Container::Webm);
        assert_eq!(job.audio.video_gain, 1.0);
    }
}
