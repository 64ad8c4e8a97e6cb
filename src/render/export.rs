//! Export Engine
//!
//! Turns a composed filter graph into an FFmpeg run: encoder selection,
//! stream mapping, progress reporting, cancellation, and the
//! write-to-temp-then-rename output discipline. Batch export runs jobs
//! strictly sequentially; FFmpeg already saturates the machine per job.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::ProjectState;
use crate::persistence::srt::to_srt_with_styles;
use crate::process::{CancelToken, ProcessError, ProcessRunner, VideoCodecKind};
use crate::render::{build_filter_graph, ExportError, ExportJob};
use crate::time::TimeMs;
use crate::workers::{spawn_worker, WorkerHandle};

// =============================================================================
// Progress / Result
// =============================================================================

/// Progress of one export run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportProgress {
    pub current_ms: TimeMs,
    pub total_ms: TimeMs,
    pub percent: f32,
}

/// A finished export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportResult {
    pub output_path: PathBuf,
    pub duration_ms: TimeMs,
    pub file_size: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Renders projects to files through FFmpeg.
#[derive(Clone)]
pub struct ExportEngine {
    runner: ProcessRunner,
}

impl ExportEngine {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    /// Renders `project` according to `job`.
    ///
    /// Writes to `<output>.tmp` and renames on success; cancellation or
    /// failure deletes the partial file and leaves any previous output
    /// untouched.
    pub async fn export(
        &self,
        project: &ProjectState,
        job: &ExportJob,
        progress_tx: Option<tokio::sync::mpsc::UnboundedSender<ExportProgress>>,
        cancel: &CancelToken,
    ) -> Result<ExportResult, ExportError> {
        // Burn-in file for the active track, if it has visible segments.
        let srt_path = self.write_burn_in_srt(project)?;

        let result = self
            .export_inner(project, job, srt_path.as_deref(), progress_tx, cancel)
            .await;

        if let Some(srt) = srt_path {
            let _ = std::fs::remove_file(srt);
        }
        result
    }

    fn write_burn_in_srt(&self, project: &ProjectState) -> Result<Option<PathBuf>, ExportError> {
        let Some(track) = project.active_track() else {
            return Ok(None);
        };
        if track.hidden || track.segments.is_empty() {
            return Ok(None);
        }

        let srt_text = to_srt_with_styles(track, &project.default_style);
        let path = std::env::temp_dir().join(format!(
            "fmm_burn_{}.srt",
            ulid::Ulid::new().to_string().to_lowercase()
        ));
        std::fs::write(&path, srt_text)?;
        Ok(Some(path))
    }

    async fn export_inner(
        &self,
        project: &ProjectState,
        job: &ExportJob,
        srt_path: Option<&Path>,
        progress_tx: Option<tokio::sync::mpsc::UnboundedSender<ExportProgress>>,
        cancel: &CancelToken,
    ) -> Result<ExportResult, ExportError> {
        let graph = build_filter_graph(project, job, srt_path)?;

        // Webm is VP9-only; other containers take the probed hardware
        // encoder with a software fallback.
        let (encoder, encoder_flags): (String, Vec<String>) = if job.container
            == crate::render::Container::Webm
        {
            (
                "libvpx-vp9".to_string(),
                vec!["-crf".to_string(), "30".to_string(), "-b:v".to_string(), "0".to_string()],
            )
        } else {
            let choice = self
                .runner
                .select_encoder(job.codec)
                .await
                .map_err(|e| ExportError::EncoderUnavailable(e.to_string()))?;
            info!(
                "export encoder: {} ({})",
                choice.name,
                if choice.hardware { "hardware" } else { "software" }
            );
            (choice.name, choice.flags)
        };

        let tmp_path = PathBuf::from(format!("{}.tmp", job.output_path.display()));
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut args: Vec<String> = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
        ];
        args.extend(graph.input_args.clone());
        args.push("-filter_complex".to_string());
        args.push(graph.filter_complex.clone());
        args.push("-map".to_string());
        args.push(format!("[{}]", graph.video_out));
        if let Some(audio_out) = &graph.audio_out {
            args.push("-map".to_string());
            args.push(format!("[{}]", audio_out));
        }
        args.push("-c:v".to_string());
        args.push(encoder);
        args.extend(encoder_flags);
        if graph.audio_out.is_some() {
            let (ac, ab): (&str, &str) = match job.container {
                crate::render::Container::Webm => ("libopus", "128k"),
                _ => ("aac", "192k"),
            };
            args.push("-c:a".to_string());
            args.push(ac.to_string());
            args.push("-b:a".to_string());
            args.push(ab.to_string());
        }
        // Bound the output to the timeline: looped image inputs would
        // otherwise keep an audio-less graph running forever.
        args.push("-t".to_string());
        args.push(format!("{:.3}", graph.total_ms as f64 / 1000.0));
        args.push("-f".to_string());
        args.push(job.container.ffmpeg_format().to_string());
        args.push("-progress".to_string());
        args.push("pipe:1".to_string());
        args.push("-y".to_string());
        args.push(tmp_path.to_string_lossy().to_string());

        let (raw_tx, mut raw_rx) =
            tokio::sync::mpsc::unbounded_channel::<crate::process::ProcessProgress>();
        let forward = progress_tx.clone();
        let total_ms = graph.total_ms;
        let forwarder = tokio::spawn(async move {
            while let Some(update) = raw_rx.recv().await {
                if let Some(tx) = &forward {
                    let percent = if total_ms > 0 {
                        (update.current_ms as f32 / total_ms as f32 * 100.0).min(100.0)
                    } else {
                        0.0
                    };
                    let _ = tx.send(ExportProgress {
                        current_ms: update.current_ms,
                        total_ms,
                        percent,
                    });
                }
            }
        });

        let run_result = self
            .runner
            .run_ffmpeg_with_progress(&args, graph.total_ms, Some(raw_tx), cancel)
            .await;
        let _ = forwarder.await;

        match run_result {
            Ok(()) => {}
            Err(ProcessError::Cancelled) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(ExportError::Cancelled);
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e.into());
            }
        }

        std::fs::rename(&tmp_path, &job.output_path)?;
        let file_size = std::fs::metadata(&job.output_path)
            .map(|m| m.len())
            .unwrap_or(0);

        info!(
            "export finished: {} ({} bytes, {}ms)",
            job.output_path.display(),
            file_size,
            graph.total_ms
        );
        Ok(ExportResult {
            output_path: job.output_path.clone(),
            duration_ms: graph.total_ms,
            file_size,
        })
    }
}

// =============================================================================
// Workers
// =============================================================================

/// Starts a single export as a background worker.
pub fn start_export(
    runner: ProcessRunner,
    project: ProjectState,
    job: ExportJob,
) -> WorkerHandle<ExportResult> {
    spawn_worker("export", move |ctx| async move {
        let engine = ExportEngine::new(runner);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let cancel = ctx.cancel_token().clone();
        let run = engine.export(&project, &job, Some(tx), &cancel);
        tokio::pin!(run);

        let map_result = |result: Result<ExportResult, ExportError>| match result {
            Ok(result) => Ok(Some(result)),
            Err(ExportError::Cancelled) => Ok(None),
            Err(e) => Err(CoreError::from(e)),
        };

        loop {
            tokio::select! {
                update = rx.recv() => {
                    match update {
                        Some(update) => ctx.progress(
                            update.current_ms.max(0) as u64,
                            update.total_ms.max(1) as u64,
                        ),
                        // Progress side closed; just wait for the run.
                        None => return map_result(run.await),
                    }
                }
                result = &mut run => return map_result(result),
            }
        }
    })
}

/// Runs several export jobs strictly sequentially, surfacing per-job
/// progress messages plus an aggregate percentage. Stops at the first
/// failing job.
pub fn start_batch_export(
    runner: ProcessRunner,
    jobs: Vec<(ProjectState, ExportJob)>,
) -> WorkerHandle<Vec<ExportResult>> {
    spawn_worker("batch-export", move |ctx| async move {
        let engine = ExportEngine::new(runner);
        let job_count = jobs.len();
        let mut results = Vec::with_capacity(job_count);

        for (index, (project, job)) in jobs.into_iter().enumerate() {
            if ctx.is_cancelled() {
                return Ok(None);
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let cancel = ctx.cancel_token().clone();
            let output_name = job
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let run = engine.export(&project, &job, Some(tx), &cancel);
            tokio::pin!(run);

            let result = loop {
                tokio::select! {
                    update = rx.recv() => {
                        match update {
                            Some(update) => {
                                // Aggregate = finished jobs + this job's share
                                let aggregate = ((index as f32 + update.percent / 100.0)
                                    / job_count as f32)
                                    * 100.0;
                                ctx.progress_message(
                                    aggregate.round() as u64,
                                    100,
                                    format!(
                                        "Job {}/{}: {} ({:.0}%)",
                                        index + 1,
                                        job_count,
                                        output_name,
                                        update.percent
                                    ),
                                );
                            }
                            None => break run.await,
                        }
                    }
                    result = &mut run => break result,
                }
            };

            match result {
                Ok(result) => results.push(result),
                Err(ExportError::Cancelled) => return Ok(None),
                Err(e) => {
                    warn!("batch export aborted at job {}: {}", index + 1, e);
                    return Err(CoreError::from(e));
                }
            }
        }

        ctx.progress(100, 100);
        Ok(Some(results))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubtitleSegment;

    fn project_with_subs() -> ProjectState {
        let mut project = ProjectState::new();
        project.video_path = Some("/videos/main.mp4".to_string());
        project.duration_ms = 10_000;
        project
            .active_track_mut()
            .unwrap()
            .add_segment(SubtitleSegment::new(0, 2000, "hello"))
            .unwrap();
        project
    }

    fn engine() -> ExportEngine {
        ExportEngine::new(ProcessRunner::new(crate::process::FfmpegInfo {
            ffmpeg_path: "/usr/bin/ffmpeg".into(),
            ffprobe_path: "/usr/bin/ffprobe".into(),
            version: "test".into(),
        }))
    }

    #[test]
    fn test_burn_in_srt_written_and_content_matches() {
        let project = project_with_subs();
        let path = engine().write_burn_in_srt(&project).unwrap().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            crate::persistence::srt::to_srt(&project.subtitle_tracks[0])
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_no_srt_for_hidden_or_empty_track() {
        let mut project = project_with_subs();
        project.subtitle_tracks[0].hidden = true;
        assert!(engine().write_burn_in_srt(&project).unwrap().is_none());

        let mut project = ProjectState::new();
        project.video_path = Some("/videos/main.mp4".to_string());
        project.duration_ms = 1000;
        assert!(engine().write_burn_in_srt(&project).unwrap().is_none());
    }

    #[test]
    fn test_no_srt_without_active_track() {
        let mut project = project_with_subs();
        project.remove_track(0).unwrap();
        assert!(engine().write_burn_in_srt(&project).unwrap().is_none());
    }
}
