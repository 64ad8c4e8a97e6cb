//! Transcription Worker
//!
//! Drives an external speech-to-text engine behind the [`Transcriber`]
//! capability trait. The worker chunks the audio (default ~5 s) so
//! cancellation takes effect at chunk boundaries, and model loading runs
//! on the worker task so the main thread never blocks on initialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::CoreResult;
use crate::model::{SubtitleSegment, SubtitleTrack};
use crate::process::{CancelToken, ProcessRunner};
use crate::time::TimeMs;
use crate::workers::{spawn_worker, WorkerHandle};

/// Default transcription chunk length.
pub const DEFAULT_CHUNK_MS: TimeMs = 5000;

// =============================================================================
// Capability Trait
// =============================================================================

/// One utterance recognized by the engine, in absolute audio time.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptSegment {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub text: String,
}

/// Options for a transcription run.
#[derive(Clone, Debug)]
pub struct TranscribeOptions {
    pub model_id: String,
    pub language: String,
    pub chunk_ms: TimeMs,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model_id: "base".to_string(),
            language: "en".to_string(),
            chunk_ms: DEFAULT_CHUNK_MS,
        }
    }
}

/// Speech-to-text engine interface.
///
/// `load` may take tens of seconds (model download/initialization) and
/// must poll `cancel`; both methods run on the worker task, never the
/// main thread.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn load(&self, model_id: &str, cancel: &CancelToken) -> CoreResult<()>;

    /// Transcribes `[start_ms, end_ms)` of the WAV, returning utterances
    /// in absolute audio time.
    async fn transcribe_range(
        &self,
        wav_path: &Path,
        start_ms: TimeMs,
        end_ms: TimeMs,
        options: &TranscribeOptions,
        cancel: &CancelToken,
    ) -> CoreResult<Vec<TranscriptSegment>>;
}

// =============================================================================
// Worker
// =============================================================================

/// Starts a chunked transcription of `wav_path`.
///
/// The finished value is a [`SubtitleTrack`] tagged with the requested
/// language. Cancelling mid-run discards partial chunk state and emits
/// `Cancelled`.
pub fn start_transcription(
    runner: ProcessRunner,
    transcriber: Arc<dyn Transcriber>,
    wav_path: PathBuf,
    options: TranscribeOptions,
) -> WorkerHandle<SubtitleTrack> {
    spawn_worker("transcribe", move |ctx| async move {
        let info = runner.probe(&wav_path).await.map_err(crate::error::CoreError::from)?;
        let total_ms = info.duration_ms.max(1);
        let chunk_ms = options.chunk_ms.max(1000);

        ctx.progress_message(0, total_ms as u64, "Loading model");
        transcriber.load(&options.model_id, ctx.cancel_token()).await?;
        // Model loading can take long enough for the user to give up.
        if ctx.is_cancelled() {
            return Ok(None);
        }

        let mut track = SubtitleTrack::new("Transcription").with_language(&options.language);
        let mut cursor: TimeMs = 0;

        while cursor < total_ms {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let chunk_end = (cursor + chunk_ms).min(total_ms);
            let segments = transcriber
                .transcribe_range(&wav_path, cursor, chunk_end, &options, ctx.cancel_token())
                .await?;

            for seg in segments {
                if seg.text.trim().is_empty() || seg.end_ms <= seg.start_ms {
                    continue;
                }
                if track
                    .add_segment(SubtitleSegment::new(
                        seg.start_ms,
                        seg.end_ms,
                        seg.text.trim(),
                    ))
                    .is_err()
                {
                    tracing::warn!(
                        "dropping overlapping transcript segment at {}ms",
                        seg.start_ms
                    );
                }
            }

            cursor = chunk_end;
            ctx.progress(cursor as u64, total_ms as u64);
        }

        info!(
            "transcription produced {} segments for {}",
            track.len(),
            wav_path.display()
        );
        Ok(Some(track))
    })
}

// =============================================================================
// Tests
// =============================================================================
