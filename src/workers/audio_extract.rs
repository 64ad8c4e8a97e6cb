//! Audio Extraction Worker
//!
//! Extracts a mono 16 kHz WAV from a video file, the input format the
//! transcriber and waveform workers expect.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::process::ProcessRunner;
use crate::workers::{spawn_worker, WorkerHandle};

/// Short content-independent key for temp file naming.
pub(crate) fn path_hash12(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..12].to_string()
}

/// Starts extraction of `video_path`'s audio into
/// `<temp_dir>/fmm_audio_<hash12>.wav`.
///
/// Progress is reported in output milliseconds against the probed
/// duration. The finished value is the WAV path.
pub fn start_audio_extraction(
    runner: ProcessRunner,
    video_path: PathBuf,
    temp_dir: PathBuf,
) -> WorkerHandle<PathBuf> {
    spawn_worker("audio-extract", move |ctx| async move {
        let info = runner.probe(&video_path).await.map_err(crate::error::CoreError::from)?;
        let total_ms = info.duration_ms.max(1);

        let output = temp_dir.join(format!(
            "fmm_audio_{}.wav",
            path_hash12(&video_path.to_string_lossy())
        ));
        std::fs::create_dir_all(&temp_dir)?;

        let args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain([
            video_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ])
        .collect();

        let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
        let run = runner.run_ffmpeg_with_progress(
            &args,
            total_ms,
            Some(progress_tx),
            ctx.cancel_token(),
        );
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                update = progress_rx.recv() => {
                    match update {
                        Some(update) => {
                            ctx.progress(update.current_ms.max(0) as u64, total_ms as u64);
                        }
                        None => break run.await,
                    }
                }
                result = &mut run => break result,
            }
        };

        match result {
            Ok(()) => Ok(Some(output)),
            Err(crate::process::ProcessError::Cancelled) => {
                let _ = std::fs::remove_file(&output);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    })
}
