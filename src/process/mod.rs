//! External Process Runner
//!
//! One abstraction for launching FFmpeg, FFprobe, and the transcription
//! engine: detection, spawn, progress parsing, cooperative cancellation,
//! and hardware-encoder probing.
//!
//! stdout and stderr are always drained concurrently. FFmpeg blocks once
//! the stderr pipe buffer fills (~4 KB), so single-pipe draining will
//! deadlock on any chatty run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::time::TimeMs;

/// Grace period between sending `q` and killing the process.
pub const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// No progress for this long marks the process as stalled (warning only).
pub const STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// How many trailing stderr bytes are kept for error reporting.
const STDERR_TAIL_BYTES: usize = 2048;

// =============================================================================
// Errors
// =============================================================================

/// External process error kinds.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("failed to spawn {command}: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("process exited with code {code}: {stderr_tail}")]
    NonZeroExit { code: i32, stderr_tail: String },

    #[error("process timed out")]
    TimedOut,

    #[error("process cancelled")]
    Cancelled,

    #[error("failed to parse process output: {0}")]
    ParseError(String),
}

pub type ProcessResult<T> = Result<T, ProcessError>;

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag shared between a worker and its owner.
///
/// `cancel()` is idempotent and race-free: a worker that finishes before
/// observing the flag still reports its normal result.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Detection
// =============================================================================

/// A detected FFmpeg installation.
#[derive(Debug, Clone)]
pub struct FfmpegInfo {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub version: String,
}

/// Locates FFmpeg/FFprobe, preferring an explicit host override, then
/// common install locations, then the system PATH.
pub fn detect_ffmpeg(override_dir: Option<&Path>) -> ProcessResult<FfmpegInfo> {
    let ffmpeg_path = find_binary("ffmpeg", override_dir)?;
    let ffprobe_path = find_binary("ffprobe", override_dir)?;
    let version = read_ffmpeg_version(&ffmpeg_path)?;
    info!("detected ffmpeg {} at {}", version, ffmpeg_path.display());
    Ok(FfmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn binary_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

fn find_binary(base: &str, override_dir: Option<&Path>) -> ProcessResult<PathBuf> {
    let name = binary_name(base);

    if let Some(dir) = override_dir {
        let candidate = dir.join(&name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        return Err(ProcessError::NotFound(candidate.display().to_string()));
    }

    for dir in common_install_dirs() {
        let candidate = dir.join(&name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    // PATH search via `which` / `where`
    let finder = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    let output = std::process::Command::new(finder)
        .arg(base)
        .output()
        .map_err(|_| ProcessError::NotFound(name.clone()))?;
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().next() {
            let path = PathBuf::from(first_line.trim());
            if path.is_file() {
                return Ok(path);
            }
        }
    }

    Err(ProcessError::NotFound(name))
}

fn common_install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\ffmpeg\bin"));
        dirs.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        if let Ok(programdata) = std::env::var("ProgramData") {
            dirs.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            dirs.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/opt/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/bin"));
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/snap/bin"));
    }

    dirs
}

fn read_ffmpeg_version(path: &Path) -> ProcessResult<String> {
    let mut cmd = std::process::Command::new(path);
    configure_std_command(&mut cmd);
    let output = cmd
        .arg("-version")
        .output()
        .map_err(|e| ProcessError::SpawnFailed {
            command: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(first_line) = stdout.lines().next() {
        if let Some(rest) = first_line.strip_prefix("ffmpeg version ") {
            if let Some(version) = rest.split_whitespace().next() {
                return Ok(version.to_string());
            }
        }
        return Ok(first_line.to_string());
    }
    Err(ProcessError::ParseError(
        "could not parse ffmpeg version".to_string(),
    ))
}

// =============================================================================
// Platform Command Setup
// =============================================================================

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Suppresses the console window ffmpeg would otherwise flash on Windows.
pub fn configure_std_command(cmd: &mut std::process::Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

// =============================================================================
// Progress Parsing
// =============================================================================

/// A progress report from a long-running external process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessProgress {
    pub current_ms: TimeMs,
    pub total_ms: TimeMs,
    /// Set when the process produced no progress for [`STALL_TIMEOUT`];
    /// the process keeps running, this is a warning only.
    pub stalled: bool,
}

/// Parses one line of FFmpeg `-progress pipe:1` output.
///
/// Returns `Some(current_ms)` on a `progress=` block boundary so the
/// caller emits exactly one update per block.
pub fn parse_progress_line(line: &str, current_ms: &mut TimeMs) -> Option<TimeMs> {
    let line = line.trim();
    if let Some(value) = line.strip_prefix("out_time_ms=") {
        // out_time_ms is in microseconds despite the name
        if let Ok(us) = value.trim().parse::<i64>() {
            *current_ms = us / 1000;
        }
        return None;
    }
    if let Some(value) = line.strip_prefix("out_time_us=") {
        if let Ok(us) = value.trim().parse::<i64>() {
            *current_ms = us / 1000;
        }
        return None;
    }
    if line.starts_with("progress=") {
        return Some(*current_ms);
    }
    None
}

// =============================================================================
// Runner
// =============================================================================

/// Runs FFmpeg/FFprobe invocations against one detected installation.
#[derive(Clone)]
pub struct ProcessRunner {
    info: Arc<FfmpegInfo>,
}

impl ProcessRunner {
    pub fn new(info: FfmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    pub fn info(&self) -> &FfmpegInfo {
        &self.info
    }

    /// Runs FFmpeg to completion, capturing output. For short jobs with
    /// no progress reporting (probes, concat, single frames).
    pub async fn run_ffmpeg(&self, args: &[String]) -> ProcessResult<Vec<u8>> {
        self.run_binary(&self.info.ffmpeg_path, args).await
    }

    /// Runs FFprobe to completion, capturing stdout.
    pub async fn run_ffprobe(&self, args: &[String]) -> ProcessResult<Vec<u8>> {
        self.run_binary(&self.info.ffprobe_path, args).await
    }

    async fn run_binary(&self, binary: &Path, args: &[String]) -> ProcessResult<Vec<u8>> {
        let mut cmd = tokio::process::Command::new(binary);
        configure_tokio_command(&mut cmd);
        debug!("running {} {}", binary.display(), args.join(" "));

        let output = cmd
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProcessError::SpawnFailed {
                command: binary.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr_tail: stderr_tail(&output.stderr),
            });
        }
        Ok(output.stdout)
    }

    /// Runs FFmpeg with `-progress pipe:1`, streaming progress updates
    /// and honoring cooperative cancellation.
    ///
    /// Cancellation sends `q` on stdin; if the process has not exited
    /// after [`CANCEL_GRACE`] it is killed. stderr is drained by its own
    /// task the whole time.
    pub async fn run_ffmpeg_with_progress(
        &self,
        args: &[String],
        total_ms: TimeMs,
        progress_tx: Option<mpsc::UnboundedSender<ProcessProgress>>,
        cancel: &CancelToken,
    ) -> ProcessResult<()> {
        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        debug!("running ffmpeg {}", args.join(" "));

        let mut child = cmd
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed {
                command: self.info.ffmpeg_path.display().to_string(),
                reason: e.to_string(),
            })?;

        // Drain stderr concurrently; keep the tail for error reporting.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        let mut stdin = child.stdin.take();
        let stdout = child.stdout.take();

        let mut lines = stdout.map(|s| BufReader::new(s).lines());
        let mut current_ms: TimeMs = 0;
        let mut cancelled = false;
        let mut stall_warned = false;
        let mut quiet = Duration::ZERO;

        // Short read timeouts so the cancel flag is observed promptly
        // even when the process goes quiet.
        const POLL: Duration = Duration::from_millis(200);

        if let Some(lines) = lines.as_mut() {
            loop {
                if cancel.is_cancelled() && !cancelled {
                    cancelled = true;
                    if let Some(stdin) = stdin.as_mut() {
                        let _ = stdin.write_all(b"q").await;
                        let _ = stdin.flush().await;
                    }
                    break;
                }

                match tokio::time::timeout(POLL, lines.next_line()).await {
                    Ok(Ok(Some(line))) => {
                        quiet = Duration::ZERO;
                        stall_warned = false;
                        if let Some(at_ms) = parse_progress_line(&line, &mut current_ms) {
                            if let Some(tx) = &progress_tx {
                                let _ = tx.send(ProcessProgress {
                                    current_ms: at_ms,
                                    total_ms,
                                    stalled: false,
                                });
                            }
                        }
                    }
                    Ok(Ok(None)) => break,
                    Ok(Err(_)) => break,
                    Err(_) => {
                        quiet += POLL;
                        // Stalled: warn once, keep waiting.
                        if quiet >= STALL_TIMEOUT && !stall_warned {
                            warn!("ffmpeg produced no progress for {:?}", quiet);
                            stall_warned = true;
                            if let Some(tx) = &progress_tx {
                                let _ = tx.send(ProcessProgress {
                                    current_ms,
                                    total_ms,
                                    stalled: true,
                                });
                            }
                        }
                    }
                }
            }
        }

        let status = if cancelled {
            match tokio::time::timeout(CANCEL_GRACE, child.wait()).await {
                Ok(Ok(status)) => Some(status),
                _ => {
                    warn!("ffmpeg ignored 'q' for {:?}, killing", CANCEL_GRACE);
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    None
                }
            }
        } else {
            Some(child.wait().await.map_err(|e| ProcessError::SpawnFailed {
                command: self.info.ffmpeg_path.display().to_string(),
                reason: e.to_string(),
            })?)
        };

        let stderr_text = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if cancelled {
            return Err(ProcessError::Cancelled);
        }

        // Only the cancelled path can leave the status empty.
        let Some(status) = status else {
            return Err(ProcessError::Cancelled);
        };
        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                code: status.code().unwrap_or(-1),
                stderr_tail: stderr_tail(stderr_text.as_bytes()),
            });
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let start = text.len() - STDERR_TAIL_BYTES;
    // Snap to a char boundary
    let start = (start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(start);
    text[start..].to_string()
}

// =============================================================================
// Media Probing
// =============================================================================

/// Media information extracted by FFprobe.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    pub duration_ms: TimeMs,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
    pub format: String,
}

impl ProcessRunner {
    /// Probes a media file with
    /// `ffprobe -v error -print_format json -show_streams -show_format`.
    pub async fn probe(&self, input: &Path) -> ProcessResult<MediaInfo> {
        let args: Vec<String> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain([input.to_string_lossy().to_string()])
        .collect();

        let stdout = self.run_ffprobe(&args).await?;
        parse_probe_output(&String::from_utf8_lossy(&stdout))
    }
}

/// Parses FFprobe JSON output into [`MediaInfo`].
pub fn parse_probe_output(json_str: &str) -> ProcessResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ProcessError::ParseError(format!("ffprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| ProcessError::ParseError("missing format info".to_string()))?;

    let duration_ms = format
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|sec| (sec * 1000.0).round() as TimeMs)
        .unwrap_or(0);

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut width = 0;
    let mut height = 0;
    let mut fps = 0.0;
    let mut has_audio = false;

    for stream in &streams {
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if width == 0 => {
                width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
                height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;
                fps = stream
                    .get("r_frame_rate")
                    .and_then(|f| f.as_str())
                    .and_then(parse_frame_rate)
                    .unwrap_or(0.0);
            }
            Some("audio") => has_audio = true,
            _ => {}
        }
    }

    Ok(MediaInfo {
        duration_ms,
        width,
        height,
        fps,
        has_audio,
        format: format_name,
    })
}

/// Parses `r_frame_rate` values like `30/1` or `30000/1001`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => s.parse().ok(),
    }
}

// =============================================================================
// Encoder Selection
// =============================================================================

/// Video codec families the exporter can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodecKind {
    H264,
    Hevc,
}

/// A chosen encoder plus the flags that tune it.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderChoice {
    pub name: String,
    pub flags: Vec<String>,
    pub hardware: bool,
}

impl ProcessRunner {
    /// Probes `ffmpeg -encoders` and picks the best encoder for the
    /// platform, falling back to `libx264`/`libx265`.
    pub async fn select_encoder(&self, codec: VideoCodecKind) -> ProcessResult<EncoderChoice> {
        let args: Vec<String> = ["-hide_banner", "-encoders"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.run_ffmpeg(&args).await?;
        Ok(choose_encoder(
            codec,
            &String::from_utf8_lossy(&output),
            std::env::consts::OS,
        ))
    }
}

/// Pure encoder choice from an `ffmpeg -encoders` listing, preferring
/// platform-native hardware encoders.
pub fn choose_encoder(codec: VideoCodecKind, encoders: &str, os: &str) -> EncoderChoice {
    let base = match codec {
        VideoCodecKind::H264 => "h264",
        VideoCodecKind::Hevc => "hevc",
    };

    let candidates: &[(&str, &[&str])] = match os {
        "macos" => &[("videotoolbox", &["-q:v", "65", "-realtime", "0"])],
        "windows" => &[
            ("nvenc", &["-preset", "p4", "-cq", "23"]),
            ("qsv", &["-global_quality", "23"]),
            ("amf", &["-quality", "balanced"]),
        ],
        _ => &[
            ("nvenc", &["-preset", "medium", "-cq", "23"]),
            ("vaapi", &["-qp", "23"]),
        ],
    };

    for (suffix, flags) in candidates {
        let name = format!("{}_{}", base, suffix);
        if encoders.contains(&name) {
            return EncoderChoice {
                name,
                flags: flags.iter().map(|s| s.to_string()).collect(),
                hardware: true,
            };
        }
    }

    let (name, flags): (&str, &[&str]) = match codec {
        VideoCodecKind::H264 => ("libx264", &["-preset", "medium", "-crf", "23"]),
        VideoCodecKind::Hevc => ("libx265", &["-preset", "medium", "-crf", "23"]),
    };
    EncoderChoice {
        name: name.to_string(),
        flags: flags.iter().map(|s| s.to_string()).collect(),
        hardware: false,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());

        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_parse_progress_lines() {
        let mut current = 0;
        assert_eq!(parse_progress_line("frame=100", &mut current), None);
        assert_eq!(parse_progress_line("out_time_ms=2500000", &mut current), None);
        assert_eq!(current, 2500);
        assert_eq!(
            parse_progress_line("progress=continue", &mut current),
            Some(2500)
        );
        assert_eq!(parse_progress_line("out_time_us=7000000", &mut current), None);
        assert_eq!(
            parse_progress_line("progress=end", &mut current),
            Some(7000)
        );
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {"duration": "10.5", "format_name": "mov,mp4,m4a"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "r_frame_rate": "30000/1001"},
                {"codec_type": "audio", "sample_rate": "48000"}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_ms, 10_500);
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!(info.has_audio);
    }

    #[test]
    fn test_parse_probe_output_no_audio() {
        let json = r#"{
            "format": {"duration": "3.0", "format_name": "mp4"},
            "streams": [
                {"codec_type": "video", "width": 640, "height": 360,
                 "r_frame_rate": "24/1"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.fps, 24.0);
    }

    #[test]
    fn test_parse_probe_rejects_bad_json() {
        assert!(parse_probe_output("nope").is_err());
        assert!(parse_probe_output("{}").is_err());
    }

    #[test]
    fn test_choose_encoder_prefers_platform_native() {
        let listing = "h264_videotoolbox\nh264_nvenc\nlibx264\nlibx265";

        let mac = choose_encoder(VideoCodecKind::H264, listing, "macos");
        assert_eq!(mac.name, "h264_videotoolbox");
        assert!(mac.hardware);

        let win = choose_encoder(VideoCodecKind::H264, listing, "windows");
        assert_eq!(win.name, "h264_nvenc");

        let linux = choose_encoder(VideoCodecKind::H264, listing, "linux");
        assert_eq!(linux.name, "h264_nvenc");
    }

    #[test]
    fn test_choose_encoder_falls_back_to_software() {
        let listing = "libx264\nlibx265";
        let choice = choose_encoder(VideoCodecKind::H264, listing, "linux");
        assert_eq!(choice.name, "libx264");
        assert!(!choice.hardware);

        let hevc = choose_encoder(VideoCodecKind::Hevc, listing, "macos");
        assert_eq!(hevc.name, "libx265");
    }

    #[test]
    fn test_stderr_tail_truncates() {
        let short = stderr_tail(b"error message");
        assert_eq!(short, "error message");

        let long = "x".repeat(5000);
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
    }

    #[tokio::test]
    async fn test_run_binary_nonzero_exit() {
        // `false` exits 1 on unix; skip when unavailable.
        if cfg!(target_os = "windows") {
            return;
        }
        let info = FfmpegInfo {
            ffmpeg_path: PathBuf::from("/bin/false"),
            ffprobe_path: PathBuf::from("/bin/false"),
            version: "test".to_string(),
        };
        if !info.ffmpeg_path.is_file() {
            return;
        }
        let runner = ProcessRunner::new(info);
        let err = runner.run_ffmpeg(&[]).await.unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_run_binary_spawn_failure() {
        let info = FfmpegInfo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            version: "test".to_string(),
        };
        let runner = ProcessRunner::new(info);
        let err = runner.run_ffmpeg(&[]).await.unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }
}
