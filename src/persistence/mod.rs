//! Persistence Layer
//!
//! Versioned JSON serialization for `.fmm.json` project files with
//! backward-compatible migration (v1 through v4), atomic saves, and
//! non-fatal warnings for missing referenced files.

pub mod srt;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::model::{ProjectState, SubtitleSegment, SubtitleTrack};

/// Current project file format version.
pub const PROJECT_VERSION: u32 = 4;

/// Project file extension (`name.fmm.json`).
pub const PROJECT_EXTENSION: &str = "fmm.json";

// =============================================================================
// Load Result
// =============================================================================

/// Non-fatal problems detected during load, surfaced to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadWarning {
    /// A referenced media file no longer exists on disk.
    ReferencedFileMissing(String),
    /// An overlay reached outside `[0, duration]` and was clamped.
    OverlayClamped { index: usize },
}

/// A loaded project plus any warnings the host should surface.
#[derive(Clone, Debug)]
pub struct LoadedProject {
    pub project: ProjectState,
    pub warnings: Vec<LoadWarning>,
}

// =============================================================================
// Save
// =============================================================================

/// Serializes the project to `path` as version-4 JSON.
///
/// The write is atomic: content goes to `path + ".tmp"` first and is
/// renamed over the target, so any failure leaves the original untouched.
pub fn save_project(project: &ProjectState, path: &Path) -> CoreResult<()> {
    let mut value = serde_json::to_value(project)
        .map_err(|e| CoreError::SchemaViolation(e.to_string()))?;
    value["version"] = Value::from(PROJECT_VERSION);

    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| CoreError::SchemaViolation(e.to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    let result = fs::write(&tmp_path, text.as_bytes()).and_then(|_| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;
    Ok(())
}

// =============================================================================
// Load
// =============================================================================

/// Loads a project from `path`, migrating v1-v3 files to the current
/// format. Missing referenced files never abort the load; they come back
/// as [`LoadWarning`]s.
pub fn load_project(path: &Path) -> CoreResult<LoadedProject> {
    let text = fs::read_to_string(path)?;
    // Tolerate a UTF-8 BOM from editors that insist on writing one.
    let text = text.trim_start_matches('\u{feff}');

    let value: Value =
        serde_json::from_str(text).map_err(|e| CoreError::MalformedJson(e.to_string()))?;

    let version = value
        .get("version")
        .map(|v| {
            v.as_u64()
                .map(|n| n as u32)
                .ok_or_else(|| CoreError::SchemaViolation("version must be a number".to_string()))
        })
        .transpose()?
        .unwrap_or(1);

    if version > PROJECT_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: version,
            supported: PROJECT_VERSION,
        });
    }

    let mut project = if version == 1 {
        migrate_v1(&value)?
    } else {
        // v2 and v3 differ from v4 only by fields our defaults cover:
        // audio_start_ms/audio_duration_ms (v3), video_clips/text_overlays
        // and per-segment volume (v4).
        serde_json::from_value::<ProjectState>(value)
            .map_err(|e| CoreError::SchemaViolation(e.to_string()))?
    };

    normalize(&mut project);
    let mut warnings = clamp_overlays(&mut project);
    warnings.extend(scan_missing_files(&project));

    Ok(LoadedProject { project, warnings })
}

/// v1: a single flat segment list with a language tag and no styles.
fn migrate_v1(value: &Value) -> CoreResult<ProjectState> {
    let mut project = ProjectState::new();

    if let Some(video_path) = value.get("video_path").and_then(Value::as_str) {
        project.video_path = Some(video_path.to_string());
    }
    project.duration_ms = value
        .get("duration_ms")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let mut track = SubtitleTrack::new("Default");
    track.language = value
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(segments) = value.get("segments").and_then(Value::as_array) {
        for seg in segments {
            let start_ms = require_i64(seg, "start_ms")?;
            let end_ms = require_i64(seg, "end_ms")?;
            let text = seg
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::SchemaViolation("segment missing text".to_string()))?;
            track
                .add_segment(SubtitleSegment::new(start_ms, end_ms, text))
                .map_err(|e| CoreError::SchemaViolation(e.to_string()))?;
        }
    }

    project.subtitle_tracks = vec![track];
    project.active_track_index = 0;
    Ok(project)
}

fn require_i64(value: &Value, field: &str) -> CoreResult<i64> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| CoreError::SchemaViolation(format!("missing or non-integer '{}'", field)))
}

/// Re-establishes model invariants on freshly loaded data.
fn normalize(project: &mut ProjectState) {
    for track in &mut project.subtitle_tracks {
        track.segments.sort_by_key(|s| s.start_ms);
    }
    if project.subtitle_tracks.is_empty() {
        project.active_track_index = -1;
    } else if project.active_track_index < 0
        || project.active_track_index as usize >= project.subtitle_tracks.len()
    {
        project.active_track_index = 0;
    }
}

/// Clamps overlays that reach outside `[0, duration]`. They are kept, not
/// dropped; the host decides what to tell the user.
fn clamp_overlays(project: &mut ProjectState) -> Vec<LoadWarning> {
    let duration = project.output_duration_ms();
    if duration <= 0 {
        return Vec::new();
    }

    let mut warnings = Vec::new();
    for (index, overlay) in project.image_overlay_track.overlays.iter_mut().enumerate() {
        let clamped_start = overlay.start_ms.clamp(0, duration - 1);
        let clamped_end = overlay.end_ms.clamp(clamped_start + 1, duration);
        if clamped_start != overlay.start_ms || clamped_end != overlay.end_ms {
            warn!(
                "clamping image overlay {} from {}~{}ms to {}~{}ms",
                index, overlay.start_ms, overlay.end_ms, clamped_start, clamped_end
            );
            overlay.start_ms = clamped_start;
            overlay.end_ms = clamped_end;
            warnings.push(LoadWarning::OverlayClamped { index });
        }
    }
    warnings
}

/// Collects warnings for referenced files that are gone from disk.
fn scan_missing_files(project: &ProjectState) -> Vec<LoadWarning> {
    let mut warnings = Vec::new();
    let mut check = |path: &str| {
        if !path.is_empty() && !Path::new(path).exists() {
            warn!("referenced file missing: {}", path);
            warnings.push(LoadWarning::ReferencedFileMissing(path.to_string()));
        }
    };

    if let Some(video) = &project.video_path {
        check(video);
    }
    if let Some(bgm) = &project.bgm {
        check(&bgm.audio_path);
    }
    for track in &project.subtitle_tracks {
        if let Some(audio) = &track.audio_path {
            check(audio);
        }
        for seg in &track.segments {
            if let Some(audio) = &seg.audio_file {
                check(audio);
            }
        }
    }
    for overlay in &project.image_overlay_track.overlays {
        check(&overlay.image_path);
    }
    warnings
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageOverlay, VideoClip, VideoClipTrack};
    use tempfile::TempDir;

    fn sample_project() -> ProjectState {
        let mut project = ProjectState::new();
        project.duration_ms = 30_000;
        project
            .active_track_mut()
            .unwrap()
            .add_segment(SubtitleSegment::new(0, 1500, "hello"))
            .unwrap();
        project
            .active_track_mut()
            .unwrap()
            .add_segment(SubtitleSegment::new(2000, 3500, "world"))
            .unwrap();
        project.video_clip_track = Some(
            VideoClipTrack::from_clips(vec![VideoClip::new(0, 30_000)]).unwrap(),
        );
        project
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");

        let project = sample_project();
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.project, project);
    }

    #[test]
    fn test_round_trip_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let path_a = dir.path().join("a.fmm.json");
        let path_b = dir.path().join("b.fmm.json");

        let project = sample_project();
        save_project(&project, &path_a).unwrap();
        let loaded = load_project(&path_a).unwrap();
        save_project(&loaded.project, &path_b).unwrap();

        assert_eq!(
            fs::read_to_string(&path_a).unwrap(),
            fs::read_to_string(&path_b).unwrap()
        );
    }

    #[test]
    fn test_save_writes_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");
        save_project(&sample_project(), &path).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["version"], Value::from(PROJECT_VERSION));
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");
        save_project(&sample_project(), &path).unwrap();
        assert!(!dir.path().join("project.fmm.json.tmp").exists());
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.fmm.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            load_project(&path),
            Err(CoreError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_load_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.fmm.json");
        fs::write(&path, r#"{"version": 99, "tracks": []}"#).unwrap();

        assert!(matches!(
            load_project(&path),
            Err(CoreError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_load_schema_violation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.fmm.json");
        // v4 segment missing required end_ms
        fs::write(
            &path,
            r#"{"version": 4, "tracks": [{"name": "T", "segments": [{"start_ms": 0, "text": "x"}]}]}"#,
        )
        .unwrap();

        assert!(matches!(
            load_project(&path),
            Err(CoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_migrate_v1() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.fmm.json");
        fs::write(
            &path,
            r#"{
                "version": 1,
                "video_path": "/videos/a.mp4",
                "duration_ms": 10000,
                "language": "en",
                "segments": [
                    {"start_ms": 0, "end_ms": 1000, "text": "one"},
                    {"start_ms": 2000, "end_ms": 3000, "text": "two"}
                ]
            }"#,
        )
        .unwrap();

        let loaded = load_project(&path).unwrap();
        let project = loaded.project;
        assert_eq!(project.subtitle_tracks.len(), 1);
        assert_eq!(project.subtitle_tracks[0].name, "Default");
        assert_eq!(project.subtitle_tracks[0].language, "en");
        assert_eq!(project.subtitle_tracks[0].segments.len(), 2);
        assert_eq!(project.active_track_index, 0);
        // Migrated segments pick up the v4 default volume
        assert_eq!(project.subtitle_tracks[0].segments[0].volume, 1.0);
        // The v1 source had no version key requirement on re-save
        let out = dir.path().join("resaved.fmm.json");
        save_project(&project, &out).unwrap();
        let reloaded = load_project(&out).unwrap();
        assert_eq!(reloaded.project, project);
    }

    #[test]
    fn test_load_v2_defaults_audio_offsets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v2.fmm.json");
        fs::write(
            &path,
            r#"{
                "version": 2,
                "duration_ms": 5000,
                "active_track_index": 0,
                "tracks": [
                    {"name": "Default", "language": "", "segments": [
                        {"start_ms": 0, "end_ms": 900, "text": "hey"}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let loaded = load_project(&path).unwrap();
        let track = &loaded.project.subtitle_tracks[0];
        assert_eq!(track.audio_start_ms, 0);
        assert_eq!(track.audio_duration_ms, 0);
        assert!(loaded.project.video_clip_track.is_none());
    }

    #[test]
    fn test_load_v3_array_shaped_tracks() {
        // v3 files wrote overlays and clips as bare arrays.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v3.fmm.json");
        fs::write(
            &path,
            r#"{
                "version": 3,
                "duration_ms": 20000,
                "active_track_index": 0,
                "tracks": [{"name": "Default", "segments": []}],
                "image_overlays": [
                    {"start_ms": 0, "end_ms": 2000, "image_path": "/img/a.png"}
                ],
                "video_clips": [
                    {"source_in_ms": 0, "source_out_ms": 5000},
                    {"source_in_ms": 10000, "source_out_ms": 20000}
                ]
            }"#,
        )
        .unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.project.image_overlay_track.len(), 1);
        let clips = loaded.project.video_clip_track.as_ref().unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips.output_duration_ms(), 15_000);
    }

    #[test]
    fn test_missing_referenced_file_is_warning_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");

        let mut project = sample_project();
        project.video_path = Some("/definitely/not/here.mp4".to_string());
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        assert!(loaded
            .warnings
            .iter()
            .any(|w| matches!(w, LoadWarning::ReferencedFileMissing(p) if p.contains("not/here"))));
        assert_eq!(loaded.project.video_path, project.video_path);
    }

    #[test]
    fn test_overlays_clamped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");

        let mut project = sample_project();
        project
            .image_overlay_track
            .add_overlay(ImageOverlay::new(25_000, 45_000, "late.png"))
            .unwrap();
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        let overlay = &loaded.project.image_overlay_track.overlays[0];
        assert_eq!(overlay.end_ms, 30_000);
        assert!(loaded
            .warnings
            .iter()
            .any(|w| matches!(w, LoadWarning::OverlayClamped { .. })));
    }

    #[test]
    fn test_active_index_repaired_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");
        fs::write(
            &path,
            r#"{"version": 4, "duration_ms": 0, "active_track_index": 7, "tracks": [
                {"name": "Only", "segments": []}
            ]}"#,
        )
        .unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.project.active_track_index, 0);
    }
}
