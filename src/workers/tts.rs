//! TTS Synthesis Worker
//!
//! Synthesises per-segment speech through an HTTP TTS engine, measures
//! each clip, concatenates them with a configurable inter-segment
//! silence, and optionally mixes the result with the primary video
//! audio. The finished track carries inferred segment timings from the
//! measured clip durations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::process::ProcessRunner;
use crate::time::TimeMs;
use crate::workers::{spawn_worker, WorkerHandle};

/// Default silence inserted between synthesized segments.
pub const DEFAULT_GAP_MS: TimeMs = 200;

/// Default network timeout for engine calls.
pub const TTS_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Errors
// =============================================================================

/// TTS engine failure kinds, mapped from HTTP/transport results.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("TTS engine rejected the credentials (HTTP 401)")]
    Unauthorized,

    #[error("TTS engine rate limit reached (HTTP 429)")]
    RateLimited,

    #[error("network failure talking to the TTS engine: {0}")]
    Transport(String),

    #[error("unexpected TTS engine response: {0}")]
    ProtocolError(String),

    #[error("speech speed {0} must be positive")]
    InvalidSpeed(f32),

    #[error("synthesis failed for segment {index} ('{preview}'): {source}")]
    SegmentFailed {
        index: usize,
        preview: String,
        #[source]
        source: Box<TtsError>,
    },
}

impl TtsError {
    fn for_segment(self, index: usize, text: &str) -> TtsError {
        let preview: String = text.chars().take(30).collect();
        TtsError::SegmentFailed {
            index,
            preview,
            source: Box::new(self),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> TtsError {
        if err.is_timeout() || err.is_connect() {
            TtsError::Transport(err.to_string())
        } else {
            TtsError::ProtocolError(err.to_string())
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> TtsError {
        match status.as_u16() {
            401 | 403 => TtsError::Unauthorized,
            429 => TtsError::RateLimited,
            _ => TtsError::ProtocolError(format!("HTTP {}", status)),
        }
    }
}

// =============================================================================
// Engine Capability
// =============================================================================

/// A voice offered by a TTS engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine voice id, e.g. `ko-KR-SunHiNeural`.
    pub name: String,
    pub gender: String,
    /// Locale tag, e.g. `ko-KR`.
    pub language: String,
    /// Short label for pickers, e.g. `SunHi (Female)`.
    pub display_name: String,
}

/// Speech synthesis engine addressed over HTTP.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extension of the audio bytes the engine returns.
    fn file_extension(&self) -> &'static str {
        "mp3"
    }

    /// Synthesizes one text fragment to audio bytes.
    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, TtsError>;

    /// Lists available voices, optionally filtered by language prefix.
    async fn list_voices(&self, language: Option<&str>) -> Result<Vec<Voice>, TtsError>;
}

/// Converts a speed multiplier to the edge-tts rate form
/// (`1.5 -> "+50%"`, `0.5 -> "-50%"`).
pub fn format_rate(speed: f32) -> Result<String, TtsError> {
    if speed <= 0.0 {
        return Err(TtsError::InvalidSpeed(speed));
    }
    let percent = ((speed - 1.0) * 100.0).round() as i32;
    if percent >= 0 {
        Ok(format!("+{}%", percent))
    } else {
        Ok(format!("{}%", percent))
    }
}

// =============================================================================
// Edge TTS Engine (free)
// =============================================================================

/// The free engine, reached through its local HTTP bridge:
/// `POST /synthesize {text, voice, rate}` returning MP3 bytes.
pub struct EdgeTtsEngine {
    endpoint: String,
    client: reqwest::Client,
}

impl EdgeTtsEngine {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TtsError> {
        let client = reqwest::Client::builder()
            .timeout(TTS_TIMEOUT)
            .build()
            .map_err(|e| TtsError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[derive(Serialize)]
struct EdgeSynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: String,
}

#[derive(Deserialize)]
struct EdgeVoice {
    #[serde(rename = "ShortName")]
    short_name: String,
    #[serde(rename = "Gender")]
    gender: String,
    #[serde(rename = "Locale")]
    locale: String,
}

#[async_trait]
impl TtsEngine for EdgeTtsEngine {
    fn name(&self) -> &'static str {
        "edge"
    }

    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::ProtocolError("empty text".to_string()));
        }
        let request = EdgeSynthesizeRequest {
            text,
            voice,
            rate: format_rate(speed)?,
        };

        let response = self
            .client
            .post(format!("{}/synthesize", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(TtsError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(TtsError::from_status(response.status()));
        }
        let bytes = response.bytes().await.map_err(TtsError::from_reqwest)?;
        if bytes.is_empty() {
            return Err(TtsError::ProtocolError("empty audio response".to_string()));
        }
        Ok(bytes.to_vec())
    }

    async fn list_voices(&self, language: Option<&str>) -> Result<Vec<Voice>, TtsError> {
        let response = self
            .client
            .get(format!("{}/voices", self.endpoint))
            .send()
            .await
            .map_err(TtsError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(TtsError::from_status(response.status()));
        }

        let raw: Vec<EdgeVoice> = response.json().await.map_err(TtsError::from_reqwest)?;
        Ok(raw
            .into_iter()
            .filter(|v| match language {
                Some(prefix) => v
                    .locale
                    .to_ascii_lowercase()
                    .starts_with(&prefix.to_ascii_lowercase()),
                None => true,
            })
            .map(|v| {
                let base = v
                    .short_name
                    .rsplit('-')
                    .next()
                    .unwrap_or(&v.short_name)
                    .replace("Neural", "");
                Voice {
                    display_name: format!("{} ({})", base, v.gender),
                    name: v.short_name,
                    gender: v.gender,
                    language: v.locale,
                }
            })
            .collect())
    }
}

// =============================================================================
// ElevenLabs Engine (premium)
// =============================================================================

/// Premium engine: `POST /v1/text-to-speech/{voice}` with an `xi-api-key`
/// header, returning MP3 bytes.
pub struct ElevenLabsEngine {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ElevenLabsEngine {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.elevenlabs.io/v1";

    pub fn new(api_key: impl Into<String>) -> Result<Self, TtsError> {
        let client = reqwest::Client::builder()
            .timeout(TTS_TIMEOUT)
            .build()
            .map_err(|e| TtsError::Transport(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: ElevenLabsVoiceSettings,
}

#[derive(Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
    speed: f32,
}

#[derive(Deserialize)]
struct ElevenLabsVoicesResponse {
    voices: Vec<ElevenLabsVoice>,
}

#[derive(Deserialize)]
struct ElevenLabsVoice {
    voice_id: String,
    name: String,
    #[serde(default)]
    labels: std::collections::HashMap<String, String>,
}

#[async_trait]
impl TtsEngine for ElevenLabsEngine {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        if speed <= 0.0 {
            return Err(TtsError::InvalidSpeed(speed));
        }
        let request = ElevenLabsRequest {
            text,
            model_id: "eleven_multilingual_v2",
            voice_settings: ElevenLabsVoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
                speed,
            },
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice))
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(TtsError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(TtsError::from_status(response.status()));
        }
        let bytes = response.bytes().await.map_err(TtsError::from_reqwest)?;
        Ok(bytes.to_vec())
    }

    async fn list_voices(&self, language: Option<&str>) -> Result<Vec<Voice>, TtsError> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(TtsError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(TtsError::from_status(response.status()));
        }

        let raw: ElevenLabsVoicesResponse =
            response.json().await.map_err(TtsError::from_reqwest)?;
        Ok(raw
            .voices
            .into_iter()
            .filter(|v| match language {
                Some(prefix) => v
                    .labels
                    .get("language")
                    .map(|l| l.to_ascii_lowercase().starts_with(&prefix.to_ascii_lowercase()))
                    .unwrap_or(true),
                None => true,
            })
            .map(|v| Voice {
                display_name: v.name.clone(),
                name: v.voice_id,
                gender: v.labels.get("gender").cloned().unwrap_or_default(),
                language: v.labels.get("language").cloned().unwrap_or_default(),
            })
            .collect())
    }
}

// =============================================================================
// Request / Result Types
// =============================================================================

/// One script line to synthesize.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptSegment {
    pub index: usize,
    pub text: String,
}

/// Mixing of the synthesized track with the primary video audio.
///
/// `video_gain` accepts either a plain gain in `[0, 1]` or, through
/// [`AudioMixSettings::duck_expression`], an FFmpeg volume expression
/// (used to duck BGM under narration).
#[derive(Clone, Debug)]
pub struct AudioMixSettings {
    pub video_audio_path: PathBuf,
    pub video_gain: f32,
    pub tts_gain: f32,
    pub duck_expression: Option<String>,
}

/// A TTS synthesis job.
#[derive(Clone, Debug)]
pub struct TtsRequest {
    pub segments: Vec<ScriptSegment>,
    pub voice: String,
    pub speed: f32,
    pub gap_ms: TimeMs,
    pub mix: Option<AudioMixSettings>,
    /// Persistent cache directory (`<data_dir>/tts_cache`). Segments
    /// whose text/voice/speed were synthesized before are reused instead
    /// of hitting the engine again.
    pub cache_dir: Option<PathBuf>,
}

impl TtsRequest {
    pub fn new(segments: Vec<ScriptSegment>, voice: impl Into<String>) -> Self {
        Self {
            segments,
            voice: voice.into(),
            speed: 1.0,
            gap_ms: DEFAULT_GAP_MS,
            mix: None,
            cache_dir: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// Cache key for one synthesized utterance.
fn synthesis_cache_key(engine: &str, voice: &str, speed: f32, text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(format!("{}\u{1}{}\u{1}{:.3}\u{1}{}", engine, voice, speed, text));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A synthesized segment with its measured placement.
#[derive(Clone, Debug, PartialEq)]
pub struct TtsSegmentAudio {
    pub index: usize,
    pub text: String,
    pub audio_path: PathBuf,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
}

/// Result of a full synthesis run.
#[derive(Clone, Debug, PartialEq)]
pub struct TtsResult {
    /// Final merged (and possibly mixed) audio file.
    pub audio_path: PathBuf,
    pub segments: Vec<TtsSegmentAudio>,
    pub total_duration_ms: TimeMs,
}

// =============================================================================
// Worker
// =============================================================================

/// Starts a synthesis run: per-segment engine calls, duration probing,
/// silence-padded concat, optional mix with the video audio.
pub fn start_tts_synthesis(
    runner: ProcessRunner,
    engine: Arc<dyn TtsEngine>,
    request: TtsRequest,
    temp_dir: PathBuf,
) -> WorkerHandle<TtsResult> {
    spawn_worker("tts", move |ctx| async move {
        if request.segments.is_empty() {
            return Err(TtsError::ProtocolError("no segments to synthesize".to_string()).into());
        }
        std::fs::create_dir_all(&temp_dir)?;

        let total_steps = request.segments.len() as u64 + 1;
        let mut synthesized: Vec<TtsSegmentAudio> = Vec::with_capacity(request.segments.len());
        let mut cursor: TimeMs = 0;

        for (step, segment) in request.segments.iter().enumerate() {
            if ctx.is_cancelled() {
                cleanup(&synthesized, &temp_dir);
                return Ok(None);
            }

            let cached = request.cache_dir.as_ref().map(|dir| {
                dir.join(format!(
                    "{}.{}",
                    synthesis_cache_key(
                        engine.name(),
                        &request.voice,
                        request.speed,
                        &segment.text
                    ),
                    engine.file_extension()
                ))
            });

            let audio_path = match &cached {
                Some(path) if path.is_file() => path.clone(),
                _ => {
                    let bytes = engine
                        .synthesize(&segment.text, &request.voice, request.speed)
                        .await
                        .map_err(|e| e.for_segment(segment.index, &segment.text))
                        .map_err(crate::error::CoreError::from)?;

                    let path = match &cached {
                        Some(path) => {
                            if let Some(parent) = path.parent() {
                                std::fs::create_dir_all(parent)?;
                            }
                            path.clone()
                        }
                        None => temp_dir.join(format!(
                            "fmm_tts_{}.{}",
                            ulid::Ulid::new().to_string().to_lowercase(),
                            engine.file_extension()
                        )),
                    };
                    std::fs::write(&path, &bytes)?;
                    path
                }
            };

            let duration_ms = runner
                .probe(&audio_path)
                .await
                .map_err(crate::error::CoreError::from)?
                .duration_ms;

            synthesized.push(TtsSegmentAudio {
                index: segment.index,
                text: segment.text.clone(),
                audio_path,
                start_ms: cursor,
                end_ms: cursor + duration_ms,
            });
            cursor += duration_ms + request.gap_ms;

            ctx.progress_message(
                step as u64 + 1,
                total_steps,
                format!("Synthesized segment {}", segment.index),
            );
        }

        if ctx.is_cancelled() {
            cleanup(&synthesized, &temp_dir);
            return Ok(None);
        }

        // Merge with inter-segment silence.
        let merged = temp_dir.join(format!(
            "fmm_tts_{}.mp3",
            ulid::Ulid::new().to_string().to_lowercase()
        ));
        concat_segments(&runner, &synthesized, request.gap_ms, &temp_dir, &merged).await?;

        let final_path = match &request.mix {
            Some(mix) => {
                let mixed = temp_dir.join(format!(
                    "fmm_tts_{}.mp3",
                    ulid::Ulid::new().to_string().to_lowercase()
                ));
                mix_with_video_audio(&runner, mix, &merged, &mixed).await?;
                mixed
            }
            None => merged,
        };

        ctx.progress_message(total_steps, total_steps, "Merged audio");

        let total_duration_ms = synthesized.last().map(|s| s.end_ms).unwrap_or(0);
        info!(
            "tts synthesis complete: {} segments, {}ms",
            synthesized.len(),
            total_duration_ms
        );
        Ok(Some(TtsResult {
            audio_path: final_path,
            segments: synthesized,
            total_duration_ms,
        }))
    })
}

/// Removes scratch clips after cancellation. Entries in the persistent
/// cache directory are kept for the next run.
fn cleanup(segments: &[TtsSegmentAudio], temp_dir: &Path) {
    for seg in segments {
        if seg.audio_path.starts_with(temp_dir) {
            let _ = std::fs::remove_file(&seg.audio_path);
        }
    }
}

/// Escapes a path for an FFmpeg concat list entry.
fn concat_entry(path: &Path) -> String {
    format!("file '{}'\n", path.to_string_lossy().replace('\'', "'\\''"))
}

async fn concat_segments(
    runner: &ProcessRunner,
    segments: &[TtsSegmentAudio],
    gap_ms: TimeMs,
    temp_dir: &Path,
    output: &Path,
) -> crate::error::CoreResult<()> {
    // One reusable silence clip between entries.
    let silence = if gap_ms > 0 && segments.len() > 1 {
        let silence_path = temp_dir.join(format!("fmm_tts_silence_{}.mp3", gap_ms));
        if !silence_path.exists() {
            let args: Vec<String> = vec![
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                "anullsrc=r=24000:cl=mono".to_string(),
                "-t".to_string(),
                format!("{:.3}", gap_ms as f64 / 1000.0),
                "-q:a".to_string(),
                "9".to_string(),
                "-y".to_string(),
                silence_path.to_string_lossy().to_string(),
            ];
            runner.run_ffmpeg(&args).await?;
        }
        Some(silence_path)
    } else {
        None
    };

    let mut list = String::new();
    for (i, seg) in segments.iter().enumerate() {
        list.push_str(&concat_entry(&seg.audio_path));
        if i + 1 < segments.len() {
            if let Some(silence) = &silence {
                list.push_str(&concat_entry(silence));
            }
        }
    }

    let list_path = temp_dir.join(format!(
        "fmm_concat_{}.txt",
        ulid::Ulid::new().to_string().to_lowercase()
    ));
    std::fs::write(&list_path, list)?;

    let args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-q:a".to_string(),
        "4".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ];
    let result = runner.run_ffmpeg(&args).await;
    let _ = std::fs::remove_file(&list_path);
    result?;
    Ok(())
}

/// Mixes the merged TTS track with the video's own audio at the
/// requested gains. A duck expression replaces the plain video gain when
/// present.
async fn mix_with_video_audio(
    runner: &ProcessRunner,
    mix: &AudioMixSettings,
    tts_path: &Path,
    output: &Path,
) -> crate::error::CoreResult<()> {
    let video_volume = match &mix.duck_expression {
        Some(expr) => format!("'{}'", expr),
        None => format!("{}", mix.video_gain.clamp(0.0, 1.0)),
    };
    let filter = format!(
        "[0:a]volume={}[a1];[1:a]volume={}[a2];[a1][a2]amix=inputs=2:duration=longest",
        video_volume,
        mix.tts_gain.clamp(0.0, 2.0)
    );

    let args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        mix.video_audio_path.to_string_lossy().to_string(),
        "-i".to_string(),
        tts_path.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-q:a".to_string(),
        "4".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ];
    runner.run_ffmpeg(&args).await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
