//! Frame Cache Worker
//!
//! Extracts JPEG thumbnails at fixed intervals into a per-source cache
//! directory (`fmm_framecache_<hash12>/frame_<ms>.jpg`) for instant
//! scrubbing previews. Lookup binary-searches the sorted filenames; the
//! disk footprint is bounded by an LRU over source directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::process::ProcessRunner;
use crate::time::TimeMs;
use crate::workers::audio_extract::path_hash12;
use crate::workers::{spawn_worker, WorkerHandle};

/// Default disk budget for all cached frames.
pub const MAX_FRAME_DISK_BYTES: u64 = 512 * 1024 * 1024;

/// Default extraction interval: one frame per second.
pub const DEFAULT_INTERVAL_MS: TimeMs = 1000;

/// A lookup farther than this from any cached frame is a miss.
pub const NEAREST_THRESHOLD_MS: TimeMs = 2000;

const DIR_PREFIX: &str = "fmm_framecache_";

// =============================================================================
// Cache
// =============================================================================

/// Disk cache of extracted frames, LRU-bounded by total bytes.
pub struct FrameCache {
    root: PathBuf,
    max_disk_bytes: u64,
    /// hash12 -> last access stamp
    access: HashMap<String, u64>,
    clock: u64,
}

impl FrameCache {
    pub fn new(root: PathBuf, max_disk_bytes: u64) -> Self {
        Self {
            root,
            max_disk_bytes,
            access: HashMap::new(),
            clock: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory for a source, created on demand. Touches the LRU.
    pub fn dir_for(&mut self, source_path: &str) -> CoreResult<PathBuf> {
        let hash = path_hash12(source_path);
        let dir = self.root.join(format!("{}{}", DIR_PREFIX, hash));
        std::fs::create_dir_all(&dir)?;
        self.clock += 1;
        self.access.insert(hash, self.clock);
        Ok(dir)
    }

    /// Whether any frames exist for this source.
    pub fn is_cached(&mut self, source_path: &str) -> bool {
        match self.dir_for(source_path) {
            Ok(dir) => sorted_frames(&dir).map(|f| !f.is_empty()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Finds the cached frame nearest to `source_ms` via binary search on
    /// the sorted filenames. Returns `CacheMiss` when nothing is cached
    /// or the best candidate is farther than `threshold_ms`; callers fall
    /// back to live extraction.
    pub fn nearest_frame(
        &mut self,
        source_path: &str,
        source_ms: TimeMs,
        threshold_ms: TimeMs,
    ) -> CoreResult<PathBuf> {
        let dir = self.dir_for(source_path)?;
        let frames = sorted_frames(&dir)?;
        if frames.is_empty() {
            return Err(CoreError::CacheMiss(source_path.to_string()));
        }

        let idx = frames.partition_point(|(ms, _)| *ms <= source_ms);
        let mut best: Option<&(TimeMs, PathBuf)> = None;
        for candidate in [idx.checked_sub(1).and_then(|i| frames.get(i)), frames.get(idx)]
            .into_iter()
            .flatten()
        {
            match best {
                Some(current) if (current.0 - source_ms).abs() <= (candidate.0 - source_ms).abs() => {}
                _ => best = Some(candidate),
            }
        }

        match best {
            Some((ms, path)) if (ms - source_ms).abs() <= threshold_ms => Ok(path.clone()),
            _ => Err(CoreError::CacheMiss(format!(
                "no frame within {}ms of {}ms",
                threshold_ms, source_ms
            ))),
        }
    }

    /// Evicts least-recently-used source directories until total disk use
    /// fits the budget. Runs synchronously after each extraction.
    pub fn enforce_budget(&mut self) -> CoreResult<u64> {
        let mut dirs: Vec<(String, PathBuf, u64)> = Vec::new();
        let mut total: u64 = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(DIR_PREFIX) || !entry.path().is_dir() {
                continue;
            }
            let size = dir_size(&entry.path())?;
            total += size;
            dirs.push((name[DIR_PREFIX.len()..].to_string(), entry.path(), size));
        }

        if total <= self.max_disk_bytes {
            return Ok(total);
        }

        // Oldest access first; untracked dirs (orphans from a previous
        // session) evict before anything we touched.
        dirs.sort_by_key(|(hash, _, _)| self.access.get(hash).copied().unwrap_or(0));
        for (hash, path, size) in dirs {
            if total <= self.max_disk_bytes {
                break;
            }
            debug!("evicting frame cache dir {} ({} bytes)", path.display(), size);
            std::fs::remove_dir_all(&path)?;
            self.access.remove(&hash);
            total = total.saturating_sub(size);
        }
        Ok(total)
    }

    /// Deletes the whole cache tree (clean shutdown).
    pub fn cleanup(&mut self) {
        for entry in std::fs::read_dir(&self.root).into_iter().flatten().flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(DIR_PREFIX) && entry.path().is_dir() {
                let _ = std::fs::remove_dir_all(entry.path());
            }
        }
        self.access.clear();
    }
}

/// Sorted `(ms, path)` pairs for a cache directory.
fn sorted_frames(dir: &Path) -> CoreResult<Vec<(TimeMs, PathBuf)>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ms) = ms_from_filename(&path) {
            frames.push((ms, path));
        }
    }
    frames.sort_by_key(|(ms, _)| *ms);
    Ok(frames)
}

/// Extracts the millisecond stamp from `frame_000001000.jpg`.
fn ms_from_filename(path: &Path) -> Option<TimeMs> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix("frame_")?;
    digits.parse().ok()
}

fn dir_size(dir: &Path) -> CoreResult<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        total += entry.metadata()?.len();
    }
    Ok(total)
}

// =============================================================================
// Workers
// =============================================================================

/// Starts batch frame extraction for `source_path` at `interval_ms`.
///
/// Frames land as `frame_<ms>.jpg` in the source's cache directory; the
/// finished value is the number of frames extracted. The disk budget is
/// enforced after the run.
pub fn start_frame_extraction(
    runner: ProcessRunner,
    cache: Arc<Mutex<FrameCache>>,
    source_path: String,
    interval_ms: TimeMs,
    width: u32,
) -> WorkerHandle<usize> {
    spawn_worker("frame-cache", move |ctx| async move {
        let interval_ms = interval_ms.max(100);
        let dir = cache
            .lock()
            .map_err(|_| CoreError::DecodeFailed("frame cache lock poisoned".to_string()))?
            .dir_for(&source_path)?;

        let info = runner
            .probe(Path::new(&source_path))
            .await
            .map_err(CoreError::from)?;
        let total_ms = info.duration_ms.max(1);
        let expected = (total_ms / interval_ms + 1) as u64;

        let fps_value = 1000.0 / interval_ms as f64;
        let pattern = dir.join("seq_%06d.jpg");
        let args: Vec<String> = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-i".to_string(),
            source_path.clone(),
            "-vf".to_string(),
            format!("fps={:.6},scale={}:-1", fps_value, width),
            "-q:v".to_string(),
            "5".to_string(),
            "-vsync".to_string(),
            "vfr".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-y".to_string(),
            pattern.to_string_lossy().to_string(),
        ];

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
                            let done = (update.current_ms / interval_ms).max(0) as u64;
                            ctx.progress(done.min(expected), expected);
                        }
                        None => break run.await,
                    }
                }
                result = &mut run => break result,
            }
        };

        match result {
            Ok(()) => {}
            Err(crate::process::ProcessError::Cancelled) => {
                // Drop the half-filled directory.
                let _ = std::fs::remove_dir_all(&dir);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        // FFmpeg wrote 1-indexed sequence names; rename to ms stamps so
        // lookups can binary-search.
        let mut seq: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("seq_"))
            })
            .collect();
        seq.sort();

        let mut extracted = 0;
        for (i, old_path) in seq.iter().enumerate() {
            let ms = i as TimeMs * interval_ms;
            let new_path = dir.join(format!("frame_{:09}.jpg", ms));
            std::fs::rename(old_path, &new_path)?;
            extracted += 1;
        }

        let total_disk = cache
            .lock()
            .map_err(|_| CoreError::DecodeFailed("frame cache lock poisoned".to_string()))?
            .enforce_budget()?;

        info!(
            "frame cache: {} frames for {} ({} bytes on disk)",
            extracted, source_path, total_disk
        );
        Ok(Some(extracted))
    })
}

/// Grabs one frame at `ms` with double seeking: a fast keyframe seek ten
/// seconds short of the target, then an accurate seek the rest of the
/// way.
pub async fn extract_frame_at(
    runner: &ProcessRunner,
    source_path: &str,
    ms: TimeMs,
    output: &Path,
) -> CoreResult<()> {
    let target_sec = ms as f64 / 1000.0;
    let input_seek = (target_sec - 10.0).max(0.0);
    let output_seek = target_sec - input_seek;

    let args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", input_seek),
        "-i".to_string(),
        source_path.to_string(),
        "-ss".to_string(),
        format!("{:.3}", output_seek),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "5".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ];
    runner.run_ffmpeg(&args).await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
