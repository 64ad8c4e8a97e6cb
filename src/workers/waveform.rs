//! Waveform Worker
//!
//! Computes per-millisecond peak pairs (positive, negative) from a WAV
//! file, normalized to `[-1, 1]`. Audio is decoded by FFmpeg to raw PCM
//! and folded in ~1-second chunks, so memory stays bounded regardless of
//! file length. Results live in a byte-bounded LRU keyed on the file's
//! content hash, mirrored to `fmm_wave_<hash12>.bin` on disk.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::process::{configure_tokio_command, ProcessRunner};
use crate::time::TimeMs;
use crate::workers::{spawn_worker, WorkerHandle};

/// Decode rate for peak analysis; 16 samples per millisecond.
const ANALYSIS_SAMPLE_RATE: u32 = 16_000;
const SAMPLES_PER_MS: usize = (ANALYSIS_SAMPLE_RATE / 1000) as usize;

/// ~1 second of s16le mono at the analysis rate.
const CHUNK_BYTES: usize = ANALYSIS_SAMPLE_RATE as usize * 2;

/// Default in-memory cache budget.
pub const MAX_WAVEFORM_BYTES: usize = 64 * 1024 * 1024;

const BIN_MAGIC: &[u8; 4] = b"FMMW";

// =============================================================================
// Data
// =============================================================================

/// Per-millisecond peak data for waveform rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformData {
    /// Max amplitude per ms, in `[0, 1]`.
    pub peaks_pos: Vec<f32>,
    /// Min amplitude per ms, in `[-1, 0]`.
    pub peaks_neg: Vec<f32>,
    pub duration_ms: TimeMs,
    pub sample_rate: u32,
}

impl WaveformData {
    /// Approximate heap footprint, used for the LRU budget.
    pub fn byte_size(&self) -> usize {
        (self.peaks_pos.len() + self.peaks_neg.len()) * std::mem::size_of::<f32>()
    }
}

/// Folds raw samples into per-ms min/max peaks.
fn fold_peaks(samples: &[i16], peaks_pos: &mut Vec<f32>, peaks_neg: &mut Vec<f32>) -> usize {
    let whole_ms = samples.len() / SAMPLES_PER_MS;
    for ms in 0..whole_ms {
        let window = &samples[ms * SAMPLES_PER_MS..(ms + 1) * SAMPLES_PER_MS];
        let mut max = i16::MIN;
        let mut min = i16::MAX;
        for &s in window {
            max = max.max(s);
            min = min.min(s);
        }
        peaks_pos.push((max as f32 / 32768.0).max(0.0));
        peaks_neg.push((min as f32 / 32768.0).min(0.0));
    }
    whole_ms * SAMPLES_PER_MS
}

// =============================================================================
// Content Hash
// =============================================================================

/// Streaming SHA-256 of a file, truncated to 12 hex chars for cache keys
/// and temp-file names.
pub fn content_hash12(path: &Path) -> CoreResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    Ok(hex[..12].to_string())
}

// =============================================================================
// LRU Cache
// =============================================================================

/// Byte-bounded LRU of computed waveforms, keyed by content hash.
/// Eviction happens synchronously on insertion overflow.
pub struct WaveformCache {
    entries: HashMap<String, Arc<WaveformData>>,
    order: Vec<String>,
    budget_bytes: usize,
    used_bytes: usize,
}

impl Default for WaveformCache {
    fn default() -> Self {
        Self::new(MAX_WAVEFORM_BYTES)
    }
}

impl WaveformCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            budget_bytes,
            used_bytes: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<WaveformData>> {
        let data = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(data)
    }

    pub fn insert(&mut self, key: String, data: Arc<WaveformData>) {
        if let Some(old) = self.entries.remove(&key) {
            self.used_bytes -= old.byte_size();
            self.order.retain(|k| k != &key);
        }
        self.used_bytes += data.byte_size();
        self.entries.insert(key.clone(), data);
        self.order.push(key);

        while self.used_bytes > self.budget_bytes && self.order.len() > 1 {
            let oldest = self.order.remove(0);
            if let Some(evicted) = self.entries.remove(&oldest) {
                debug!("evicting waveform {} ({} bytes)", oldest, evicted.byte_size());
                self.used_bytes -= evicted.byte_size();
            }
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }
}

// =============================================================================
// Disk Mirror
// =============================================================================

/// Writes peaks as a small little-endian binary blob.
pub fn write_waveform_bin(data: &WaveformData, path: &Path) -> CoreResult<()> {
    let mut out = Vec::with_capacity(20 + data.byte_size());
    out.extend_from_slice(BIN_MAGIC);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&data.sample_rate.to_le_bytes());
    out.extend_from_slice(&data.duration_ms.to_le_bytes());
    out.extend_from_slice(&(data.peaks_pos.len() as u64).to_le_bytes());
    for p in &data.peaks_pos {
        out.extend_from_slice(&p.to_le_bytes());
    }
    for p in &data.peaks_neg {
        out.extend_from_slice(&p.to_le_bytes());
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// Reads a blob written by [`write_waveform_bin`].
pub fn read_waveform_bin(path: &Path) -> CoreResult<WaveformData> {
    let bytes = std::fs::read(path)?;
    let fail = |msg: &str| CoreError::DecodeFailed(format!("{}: {}", path.display(), msg));

    if bytes.len() < 28 || &bytes[0..4] != BIN_MAGIC {
        return Err(fail("bad header"));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap_or_default());
    if version != 1 {
        return Err(fail("unknown version"));
    }
    let sample_rate = u32::from_le_bytes(bytes[8..12].try_into().unwrap_or_default());
    let duration_ms = i64::from_le_bytes(bytes[12..20].try_into().unwrap_or_default());
    let len = u64::from_le_bytes(bytes[20..28].try_into().unwrap_or_default()) as usize;

    let expected = 28 + len * 8;
    if bytes.len() != expected {
        return Err(fail("truncated payload"));
    }

    let mut peaks_pos = Vec::with_capacity(len);
    let mut peaks_neg = Vec::with_capacity(len);
    let mut offset = 28;
    for _ in 0..len {
        peaks_pos.push(f32::from_le_bytes(
            bytes[offset..offset + 4].try_into().unwrap_or_default(),
        ));
        offset += 4;
    }
    for _ in 0..len {
        peaks_neg.push(f32::from_le_bytes(
            bytes[offset..offset + 4].try_into().unwrap_or_default(),
        ));
        offset += 4;
    }

    Ok(WaveformData {
        peaks_pos,
        peaks_neg,
        duration_ms,
        sample_rate,
    })
}

// =============================================================================
// Worker
// =============================================================================

/// Starts peak computation for `wav_path`.
///
/// Checks the memory cache, then the disk mirror; otherwise decodes via
/// FFmpeg and stores through both. Cancellation is observed between
/// chunks.
pub fn start_waveform(
    runner: ProcessRunner,
    wav_path: PathBuf,
    temp_dir: PathBuf,
    cache: Arc<Mutex<WaveformCache>>,
) -> WorkerHandle<Arc<WaveformData>> {
    spawn_worker("waveform", move |ctx| async move {
        let key = content_hash12(&wav_path)?;

        if let Some(hit) = cache.lock().ok().and_then(|mut c| c.get(&key)) {
            debug!("waveform cache hit for {}", key);
            return Ok(Some(hit));
        }

        let bin_path = temp_dir.join(format!("fmm_wave_{}.bin", key));
        if bin_path.exists() {
            match read_waveform_bin(&bin_path) {
                Ok(data) => {
                    let data = Arc::new(data);
                    if let Ok(mut c) = cache.lock() {
                        c.insert(key, data.clone());
                    }
                    return Ok(Some(data));
                }
                Err(e) => {
                    // Non-fatal: fall through to recompute.
                    tracing::warn!("stale waveform mirror {}: {}", bin_path.display(), e);
                    let _ = std::fs::remove_file(&bin_path);
                }
            }
        }

        let total_ms = runner
            .probe(&wav_path)
            .await
            .map_err(CoreError::from)?
            .duration_ms
            .max(1);

        let args: Vec<String> = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-i".to_string(),
            wav_path.to_string_lossy().to_string(),
            "-f".to_string(),
            "s16le".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            ANALYSIS_SAMPLE_RATE.to_string(),
            "-".to_string(),
        ];
        let mut cmd = tokio::process::Command::new(&runner.info().ffmpeg_path);
        configure_tokio_command(&mut cmd);
        let mut child = cmd
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| crate::process::ProcessError::SpawnFailed {
                command: runner.info().ffmpeg_path.display().to_string(),
                reason: e.to_string(),
            })
            .map_err(CoreError::from)?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            CoreError::DecodeFailed("ffmpeg stdout unavailable".to_string())
        })?;

        let mut peaks_pos: Vec<f32> = Vec::with_capacity(total_ms as usize);
        let mut peaks_neg: Vec<f32> = Vec::with_capacity(total_ms as usize);
        let mut pending: Vec<i16> = Vec::with_capacity(CHUNK_BYTES / 2 + SAMPLES_PER_MS);
        let mut leftover_byte: Option<u8> = None;
        let mut buf = vec![0u8; CHUNK_BYTES];

        loop {
            if ctx.is_cancelled() {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Ok(None);
            }

            let n = stdout
                .read(&mut buf)
                .await
                .map_err(|e| CoreError::DecodeFailed(e.to_string()))?;
            if n == 0 {
                break;
            }

            // Stitch the carried byte back on so samples never split
            // across chunk boundaries.
            let mut bytes = Vec::with_capacity(n + 1);
            if let Some(first) = leftover_byte.take() {
                bytes.push(first);
            }
            bytes.extend_from_slice(&buf[..n]);
            if bytes.len() % 2 == 1 {
                leftover_byte = bytes.pop();
            }
            for pair in bytes.chunks_exact(2) {
                pending.push(i16::from_le_bytes([pair[0], pair[1]]));
            }

            let consumed = fold_peaks(&pending, &mut peaks_pos, &mut peaks_neg);
            pending.drain(..consumed);

            ctx.progress(peaks_pos.len().min(total_ms as usize) as u64, total_ms as u64);
        }

        // Trailing partial millisecond
        if !pending.is_empty() {
            while pending.len() < SAMPLES_PER_MS {
                pending.push(0);
            }
            fold_peaks(&pending, &mut peaks_pos, &mut peaks_neg);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CoreError::DecodeFailed(e.to_string()))?;
        if !status.success() {
            return Err(CoreError::DecodeFailed(format!(
                "ffmpeg pcm decode exited with {}",
                status.code().unwrap_or(-1)
            )));
        }

        let data = Arc::new(WaveformData {
            duration_ms: peaks_pos.len() as TimeMs,
            sample_rate: ANALYSIS_SAMPLE_RATE,
            peaks_pos,
            peaks_neg,
        });

        if let Err(e) = write_waveform_bin(&data, &bin_path) {
            tracing::warn!("could not mirror waveform to disk: {}", e);
        }
        if let Ok(mut c) = cache.lock() {
            c.insert(key, data.clone());
        }

        info!(
            "waveform computed: {}ms from {}",
            data.duration_ms,
            wav_path.display()
        );
        Ok(Some(data))
    })
}

// =============================================================================
// Tests
// =============================================================================
