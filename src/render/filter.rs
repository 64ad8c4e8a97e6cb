//! Filter Graph Construction
//!
//! Builds the deterministic `-filter_complex` graph for an export:
//! per-clip preprocessing, concat/xfade joins, subtitle burn-in, PIP
//! overlays, text overlays, and the audio mix. The graph is pure data;
//! the engine turns it into an FFmpeg invocation.

use std::path::Path;

use crate::model::{ProjectState, TextAlignment, TextVAlignment, VideoClip};
use crate::render::{ExportError, ExportJob};
use crate::time::TimeMs;

/// A composed filter graph ready to hand to FFmpeg.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterGraph {
    /// Input arguments in order (`-i` groups, including `-loop 1` for
    /// still images).
    pub input_args: Vec<String>,
    pub filter_complex: String,
    /// Final video label (no brackets).
    pub video_out: String,
    /// Final audio label, absent when the output has no audio streams.
    pub audio_out: Option<String>,
    /// Output duration after transition collapse.
    pub total_ms: TimeMs,
}

/// Formats milliseconds as seconds for filter expressions: at least one
/// decimal, trailing zeros trimmed (`1000 -> "1.0"`, `1250 -> "1.25"`).
pub(crate) fn fmt_sec(ms: TimeMs) -> String {
    let mut text = format!("{:.3}", ms as f64 / 1000.0);
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    text
}

/// Escapes a path for `subtitles=` (and friends): forward slashes, then
/// escaped colons and quotes.
pub(crate) fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Escapes literal text for a `drawtext` filter.
pub(crate) fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
        .replace('\n', " ")
}

struct GraphBuilder {
    input_args: Vec<String>,
    next_input: usize,
    parts: Vec<String>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            input_args: Vec::new(),
            next_input: 0,
            parts: Vec::new(),
        }
    }

    fn add_input(&mut self, path: &str) -> usize {
        self.input_args.push("-i".to_string());
        self.input_args.push(path.to_string());
        let idx = self.next_input;
        self.next_input += 1;
        idx
    }

    fn add_image_input(&mut self, path: &str) -> usize {
        self.input_args.push("-loop".to_string());
        self.input_args.push("1".to_string());
        let idx = self.add_input(path);
        idx
    }

    fn push(&mut self, part: String) {
        self.parts.push(part);
    }

    fn filter_complex(&self) -> String {
        self.parts.join(";")
    }
}

/// Resolved clip list plus transition collapse amounts.
struct ClipPlan {
    clips: Vec<VideoClip>,
    paths: Vec<String>,
    total_ms: TimeMs,
}

fn plan_clips(project: &ProjectState) -> Result<ClipPlan, ExportError> {
    let clips: Vec<VideoClip> = match &project.video_clip_track {
        Some(track) if !track.is_empty() => track.clips().to_vec(),
        _ => {
            if project.duration_ms <= 0 {
                return Err(ExportError::FilterGraphBuildFailed(
                    "project has no video duration".to_string(),
                ));
            }
            vec![VideoClip::new(0, project.duration_ms)]
        }
    };

    let mut paths = Vec::with_capacity(clips.len());
    for clip in &clips {
        let path = match &clip.source_path {
            Some(path) => path.clone(),
            None => project.video_path.clone().ok_or_else(|| {
                ExportError::FilterGraphBuildFailed(
                    "clip references the primary video but the project has none".to_string(),
                )
            })?,
        };
        paths.push(path);
    }

    let mut total: TimeMs = clips.iter().map(|c| c.duration_ms()).sum();
    for clip in clips.iter().take(clips.len().saturating_sub(1)) {
        if let Some(t) = clip.transition {
            total -= t.duration_ms;
        }
    }

    Ok(ClipPlan {
        clips,
        paths,
        total_ms: total,
    })
}

/// Collapse charged to clip `i` from the transition before it.
fn incoming_deduct(clips: &[VideoClip], i: usize) -> TimeMs {
    if i == 0 {
        return 0;
    }
    clips[i - 1]
        .transition
        .map(|t| t.duration_ms - t.duration_ms / 2)
        .unwrap_or(0)
}

/// Collapse charged to clip `i` from its own outgoing transition.
fn outgoing_deduct(clips: &[VideoClip], i: usize) -> TimeMs {
    if i + 1 >= clips.len() {
        return 0;
    }
    clips[i].transition.map(|t| t.duration_ms / 2).unwrap_or(0)
}

/// Builds the export filter graph for `project`.
///
/// `srt_path` is the pre-rendered subtitle file to burn in, if any.
pub fn build_filter_graph(
    project: &ProjectState,
    job: &ExportJob,
    srt_path: Option<&Path>,
) -> Result<FilterGraph, ExportError> {
    let plan = plan_clips(project)?;
    let mut builder = GraphBuilder::new();

    let clip_inputs: Vec<usize> = plan.paths.iter().map(|p| builder.add_input(p)).collect();

    // ------------------------------------------------------------------
    // 1. Per-clip preprocessing
    // ------------------------------------------------------------------
    let (w, h) = (job.width, job.height);
    for (i, clip) in plan.clips.iter().enumerate() {
        let mut chain = format!(
            "[{idx}:v]trim=start={start}:end={end},setpts=PTS-STARTPTS,\
             scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            idx = clip_inputs[i],
            start = fmt_sec(clip.source_in_ms),
            end = fmt_sec(clip.source_out_ms),
        );
        if !clip.filters.is_identity() {
            let mut eq = Vec::new();
            if let Some(b) = clip.filters.brightness {
                eq.push(format!("brightness={}", b));
            }
            if let Some(c) = clip.filters.contrast {
                eq.push(format!("contrast={}", c));
            }
            if let Some(s) = clip.filters.saturation {
                eq.push(format!("saturation={}", s));
            }
            chain.push_str(&format!(",eq={}", eq.join(":")));
        }
        chain.push_str(&format!("[v{}]", i));
        builder.push(chain);
    }

    // ------------------------------------------------------------------
    // 2. Concat / xfade joins
    // ------------------------------------------------------------------
    let has_transitions = plan
        .clips
        .iter()
        .take(plan.clips.len().saturating_sub(1))
        .any(|c| c.transition.is_some());

    let mut base = if plan.clips.len() == 1 {
        "v0".to_string()
    } else if !has_transitions {
        let inputs: String = (0..plan.clips.len()).map(|i| format!("[v{}]", i)).collect();
        builder.push(format!(
            "{}concat=n={}:v=1:a=0[vcat]",
            inputs,
            plan.clips.len()
        ));
        "vcat".to_string()
    } else {
        // Pairwise chain: xfade at declared transitions, 2-way concat at
        // hard boundaries.
        let mut current = "v0".to_string();
        let mut chain_ms = plan.clips[0].duration_ms();
        for i in 1..plan.clips.len() {
            let next_label = format!("vx{}", i);
            match plan.clips[i - 1].transition {
                Some(t) => {
                    let offset = chain_ms - t.duration_ms;
                    builder.push(format!(
                        "[{current}][v{i}]xfade=transition={kind}:duration={dur}:offset={off}[{next_label}]",
                        kind = t.kind.ffmpeg_name(),
                        dur = fmt_sec(t.duration_ms),
                        off = fmt_sec(offset),
                    ));
                    chain_ms += plan.clips[i].duration_ms() - t.duration_ms;
                }
                None => {
                    builder.push(format!(
                        "[{current}][v{i}]concat=n=2:v=1:a=0[{next_label}]"
                    ));
                    chain_ms += plan.clips[i].duration_ms();
                }
            }
            current = next_label;
        }
        current
    };

    // ------------------------------------------------------------------
    // 3. Subtitle burn-in
    // ------------------------------------------------------------------
    if let Some(srt) = srt_path {
        builder.push(format!(
            "[{base}]subtitles={}[vsub]",
            escape_filter_path(srt)
        ));
        base = "vsub".to_string();
    }

    // ------------------------------------------------------------------
    // 4. PIP image overlays
    // ------------------------------------------------------------------
    if !project.image_overlay_track.hidden {
        for (k, overlay) in project.image_overlay_track.overlays.iter().enumerate() {
            let idx = builder.add_image_input(&overlay.image_path);
            let scaled_w = ((w as f32) * overlay.scale_percent / 100.0).round() as i64;
            builder.push(format!(
                "[{idx}:v]format=rgba,colorchannelmixer=aa={op},scale={sw}:-1[ovi{k}]",
                op = overlay.opacity.clamp(0.0, 1.0),
                sw = scaled_w.max(1),
            ));
            let x = ((w as f32) * overlay.x_percent / 100.0).round() as i64;
            let y = ((h as f32) * overlay.y_percent / 100.0).round() as i64;
            builder.push(format!(
                "[{base}][ovi{k}]overlay=x={x}:y={y}:enable='between(t,{s},{e})'[vov{k}]",
                s = fmt_sec(overlay.start_ms),
                e = fmt_sec(overlay.end_ms),
            ));
            base = format!("vov{}", k);
        }
    }

    // ------------------------------------------------------------------
    // 5. Text overlays
    // ------------------------------------------------------------------
    if !project.text_overlay_track.hidden {
        for (k, overlay) in project.text_overlay_track.overlays.iter().enumerate() {
            let style = overlay.style.as_ref().unwrap_or(&project.default_style);
            let x = ((w as f32) * overlay.x_percent / 100.0).round() as i64;
            let y = ((h as f32) * overlay.y_percent / 100.0).round() as i64;
            let x_expr = match overlay.alignment {
                TextAlignment::Left => format!("{}", x),
                TextAlignment::Center => format!("{}-text_w/2", x),
                TextAlignment::Right => format!("{}-text_w", x),
            };
            let y_expr = match overlay.v_alignment {
                TextVAlignment::Top => format!("{}", y),
                TextVAlignment::Middle => format!("{}-text_h/2", y),
                TextVAlignment::Bottom => format!("{}-text_h", y),
            };
            let color = if style.font_color.is_empty() {
                "white".to_string()
            } else {
                style.font_color.clone()
            };
            builder.push(format!(
                "[{base}]drawtext=text='{text}':font='{font}':fontsize={size}:\
                 fontcolor={color}@{alpha}:borderw={bw}:bordercolor={bc}:\
                 x={x_expr}:y={y_expr}:enable='between(t,{s},{e})'[vtx{k}]",
                text = escape_drawtext(&overlay.text),
                font = style.font_family,
                size = style.font_size,
                alpha = overlay.opacity.clamp(0.0, 1.0),
                bw = style.outline_width,
                bc = if style.outline_color.is_empty() {
                    "black"
                } else {
                    &style.outline_color
                },
                s = fmt_sec(overlay.start_ms),
                e = fmt_sec(overlay.end_ms),
            ));
            base = format!("vtx{}", k);
        }
    }

    if base != "vout" {
        builder.push(format!("[{base}]null[vout]"));
    }

    // ------------------------------------------------------------------
    // 6. Audio mix
    // ------------------------------------------------------------------
    let audio_out = build_audio_graph(project, job, &plan, &clip_inputs, &mut builder);

    Ok(FilterGraph {
        input_args: builder.input_args.clone(),
        filter_complex: builder.filter_complex(),
        video_out: "vout".to_string(),
        audio_out,
        total_ms: plan.total_ms,
    })
}

/// Assembles the audio side: clip audio (crossfaded or hard-cut), the
/// TTS track with per-segment volumes, and BGM, merged with `amix`.
fn build_audio_graph(
    project: &ProjectState,
    job: &ExportJob,
    plan: &ClipPlan,
    clip_inputs: &[usize],
    builder: &mut GraphBuilder,
) -> Option<String> {
    let mut sources: Vec<String> = Vec::new();

    // Primary video audio, following the clip cuts.
    if project.video_has_audio && job.audio.video_gain > 0.0 {
        let n = plan.clips.len();
        for (i, clip) in plan.clips.iter().enumerate() {
            // A hard cut next to a video transition trims the audio to
            // the collapsed window so streams stay aligned; an audio
            // crossfade keeps the full window and overlaps instead.
            let in_deduct = if audio_crossfades(plan, i.wrapping_sub(1)) {
                0
            } else {
                incoming_deduct(&plan.clips, i)
            };
            let out_deduct = if audio_crossfades(plan, i) {
                0
            } else {
                outgoing_deduct(&plan.clips, i)
            };
            builder.push(format!(
                "[{idx}:a]atrim=start={s}:end={e},asetpts=PTS-STARTPTS[a{i}]",
                idx = clip_inputs[i],
                s = fmt_sec(clip.source_in_ms + in_deduct),
                e = fmt_sec(clip.source_out_ms - out_deduct),
            ));
        }

        let joined = if n == 1 {
            "a0".to_string()
        } else {
            let mut current = "a0".to_string();
            for i in 1..n {
                let next_label = format!("ax{}", i);
                if audio_crossfades(plan, i - 1) {
                    let d = plan.clips[i - 1]
                        .transition
                        .map(|t| t.duration_ms)
                        .unwrap_or(0);
                    builder.push(format!(
                        "[{current}][a{i}]acrossfade=d={}[{next_label}]",
                        fmt_sec(d)
                    ));
                } else {
                    builder.push(format!(
                        "[{current}][a{i}]concat=n=2:v=0:a=1[{next_label}]"
                    ));
                }
                current = next_label;
            }
            current
        };
        builder.push(format!(
            "[{joined}]volume={}[avid]",
            job.audio.video_gain.clamp(0.0, 1.0)
        ));
        sources.push("avid".to_string());
    }

    // Synthesized narration for the active track.
    if let Some(track) = project.active_track() {
        if !track.muted && !track.hidden {
            if let Some(audio_path) = &track.audio_path {
                let idx = builder.add_input(audio_path);
                let gain = job.audio.tts_gain.clamp(0.0, 2.0);
                let delay = track.audio_start_ms.max(0);

                let uniform = track.segments.iter().all(|s| (s.volume - 1.0).abs() < f32::EPSILON);
                if uniform || track.segments.is_empty() {
                    builder.push(format!(
                        "[{idx}:a]adelay={delay}|{delay},volume={gain}[atts]"
                    ));
                    sources.push("atts".to_string());
                } else {
                    // Per-segment volume: sliced copies of the track
                    // audio, re-delayed to their timeline spots.
                    let mut seg_labels = Vec::new();
                    for (j, seg) in track.segments.iter().enumerate() {
                        let rel_start = (seg.start_ms - track.audio_start_ms).max(0);
                        let rel_end = (seg.end_ms - track.audio_start_ms).max(rel_start);
                        builder.push(format!(
                            "[{idx}:a]atrim=start={s}:end={e},asetpts=PTS-STARTPTS,\
                             volume={v},adelay={d}|{d}[aseg{j}]",
                            s = fmt_sec(rel_start),
                            e = fmt_sec(rel_end),
                            v = seg.volume.clamp(0.0, 2.0) * gain,
                            d = seg.start_ms.max(0),
                        ));
                        seg_labels.push(format!("[aseg{}]", j));
                    }
                    builder.push(format!(
                        "{}amix=inputs={}:duration=longest:dropout_transition=0[atts]",
                        seg_labels.join(""),
                        seg_labels.len()
                    ));
                    sources.push("atts".to_string());
                }
            }
        }
    }

    // Background music.
    if let Some(bgm) = &project.bgm {
        let idx = builder.add_input(&bgm.audio_path);
        let delay = bgm.start_ms.max(0);
        builder.push(format!(
            "[{idx}:a]volume={},adelay={delay}|{delay}[abgm]",
            bgm.volume.clamp(0.0, 2.0)
        ));
        sources.push("abgm".to_string());
    }

    match sources.len() {
        0 => None,
        1 => {
            builder.push(format!("[{}]anull[aout]", sources[0]));
            Some("aout".to_string())
        }
        n => {
            let inputs: String = sources.iter().map(|s| format!("[{}]", s)).collect();
            builder.push(format!("{}amix=inputs={}:duration=longest[aout]", inputs, n));
            Some("aout".to_string())
        }
    }
}

/// Whether the boundary after clip `i` crossfades its audio.
fn audio_crossfades(plan: &ClipPlan, i: usize) -> bool {
    plan.clips
        .get(i)
        .and_then(|c| c.transition)
        .map(|t| t.audio_crossfade)
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
