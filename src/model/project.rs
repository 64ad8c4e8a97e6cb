//! Project State Model
//!
//! The root aggregate for an editing session. All mutation flows through
//! the command layer on the main thread; workers only produce values that
//! are applied back here as commands.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::clip::VideoClipTrack;
use crate::model::overlay::{ImageOverlayTrack, TextOverlayTrack};
use crate::model::style::SubtitleStyle;
use crate::model::subtitle::SubtitleTrack;
use crate::time::TimeMs;

// =============================================================================
// Background Music Track
// =============================================================================

/// Audio-only background music with its own gain and timeline position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BgmTrack {
    pub audio_path: String,
    #[serde(default = "default_bgm_volume")]
    pub volume: f32,
    #[serde(default)]
    pub start_ms: TimeMs,
}

fn default_bgm_volume() -> f32 {
    1.0
}

impl BgmTrack {
    pub fn new(audio_path: impl Into<String>) -> Self {
        Self {
            audio_path: audio_path.into(),
            volume: 1.0,
            start_ms: 0,
        }
    }
}

// =============================================================================
// Project State
// =============================================================================

/// Holds the current state of an editing session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Primary project video. Stored as the path string captured at edit
    /// time; absence on disk is detected at load, not here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Primary video duration. The output timeline duration is derived
    /// via [`ProjectState::output_duration_ms`].
    #[serde(default)]
    pub duration_ms: TimeMs,
    #[serde(default)]
    pub default_style: SubtitleStyle,
    /// Index into `subtitle_tracks`; `-1` when there are no tracks.
    #[serde(default)]
    pub active_track_index: i32,
    #[serde(default, rename = "tracks")]
    pub subtitle_tracks: Vec<SubtitleTrack>,
    #[serde(default, rename = "image_overlays")]
    pub image_overlay_track: ImageOverlayTrack,
    #[serde(default, rename = "text_overlays")]
    pub text_overlay_track: TextOverlayTrack,
    /// `None` = no cut editing; the timeline equals the primary video.
    #[serde(default, rename = "video_clips", skip_serializing_if = "Option::is_none")]
    pub video_clip_track: Option<VideoClipTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<BgmTrack>,
    /// Whether the primary video file has an audio stream, probed at load.
    #[serde(default)]
    pub video_has_audio: bool,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectState {
    /// Creates an empty project with a single default subtitle track.
    pub fn new() -> Self {
        Self {
            video_path: None,
            duration_ms: 0,
            default_style: SubtitleStyle::default(),
            active_track_index: 0,
            subtitle_tracks: vec![SubtitleTrack::new("Default")],
            image_overlay_track: ImageOverlayTrack::new(),
            text_overlay_track: TextOverlayTrack::new(),
            video_clip_track: None,
            bgm: None,
            video_has_audio: false,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_path.is_some()
    }

    /// Output-timeline duration: the clip track's collapsed total when cut
    /// editing is active, else the primary video duration.
    pub fn output_duration_ms(&self) -> TimeMs {
        match &self.video_clip_track {
            Some(track) if !track.is_empty() => track.output_duration_ms(),
            _ => self.duration_ms,
        }
    }

    /// The active subtitle track, if any.
    pub fn active_track(&self) -> Option<&SubtitleTrack> {
        usize::try_from(self.active_track_index)
            .ok()
            .and_then(|i| self.subtitle_tracks.get(i))
    }

    pub fn active_track_mut(&mut self) -> Option<&mut SubtitleTrack> {
        usize::try_from(self.active_track_index)
            .ok()
            .and_then(|i| self.subtitle_tracks.get_mut(i))
    }

    /// Switches the active track, validating the index.
    pub fn set_active_track(&mut self, index: usize) -> CoreResult<()> {
        if index >= self.subtitle_tracks.len() {
            return Err(CoreError::NotFound(index));
        }
        self.active_track_index = index as i32;
        Ok(())
    }

    /// Adds a subtitle track and makes it active if it is the first.
    pub fn add_track(&mut self, track: SubtitleTrack) -> usize {
        self.subtitle_tracks.push(track);
        if self.active_track_index < 0 {
            self.active_track_index = 0;
        }
        self.subtitle_tracks.len() - 1
    }

    /// Removes a subtitle track, keeping `active_track_index` valid
    /// (`-1` when no tracks remain).
    pub fn remove_track(&mut self, index: usize) -> CoreResult<SubtitleTrack> {
        if index >= self.subtitle_tracks.len() {
            return Err(CoreError::NotFound(index));
        }
        let removed = self.subtitle_tracks.remove(index);
        if self.subtitle_tracks.is_empty() {
            self.active_track_index = -1;
        } else if self.active_track_index as usize >= self.subtitle_tracks.len() {
            self.active_track_index = self.subtitle_tracks.len() as i32 - 1;
        }
        Ok(removed)
    }

    /// Starts cut editing with a single clip covering the full video.
    pub fn enable_clip_editing(&mut self) -> &mut VideoClipTrack {
        let duration_ms = self.duration_ms;
        self.video_clip_track
            .get_or_insert_with(|| VideoClipTrack::from_full_video(duration_ms))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::clip::VideoClip;
    use crate::model::subtitle::SubtitleSegment;

    #[test]
    fn test_new_project_has_default_track() {
        let project = ProjectState::new();
        assert_eq!(project.subtitle_tracks.len(), 1);
        assert_eq!(project.active_track_index, 0);
        assert_eq!(project.active_track().unwrap().name, "Default");
        assert!(!project.has_video());
    }

    #[test]
    fn test_output_duration_without_clip_track() {
        let mut project = ProjectState::new();
        project.duration_ms = 60_000;
        assert_eq!(project.output_duration_ms(), 60_000);
    }

    #[test]
    fn test_output_duration_with_clip_track() {
        let mut project = ProjectState::new();
        project.duration_ms = 60_000;
        let track = project.enable_clip_editing();
        track.split_clip_at_timeline(10_000).unwrap();
        track.remove_clip(0).unwrap();
        assert_eq!(project.output_duration_ms(), 50_000);
    }

    #[test]
    fn test_remove_track_fixes_active_index() {
        let mut project = ProjectState::new();
        project.add_track(SubtitleTrack::new("Korean"));
        project.set_active_track(1).unwrap();

        project.remove_track(1).unwrap();
        assert_eq!(project.active_track_index, 0);

        project.remove_track(0).unwrap();
        assert_eq!(project.active_track_index, -1);
        assert!(project.active_track().is_none());
    }

    #[test]
    fn test_set_active_track_validates() {
        let mut project = ProjectState::new();
        assert!(project.set_active_track(3).is_err());
        assert_eq!(project.active_track_index, 0);
    }

    #[test]
    fn test_project_round_trip() {
        let mut project = ProjectState::new();
        project.video_path = Some("/videos/input.mp4".to_string());
        project.duration_ms = 30_000;
        project
            .active_track_mut()
            .unwrap()
            .add_segment(SubtitleSegment::new(0, 1000, "hi"))
            .unwrap();
        project.video_clip_track = Some(
            VideoClipTrack::from_clips(vec![VideoClip::new(0, 30_000)]).unwrap(),
        );
        project.bgm = Some(BgmTrack::new("/music/bgm.mp3"));

        let json = serde_json::to_string_pretty(&project).unwrap();
        let parsed: ProjectState = serde_json::from_str(&json).unwrap();
        assert_eq!(project, parsed);
    }

    #[test]
    fn test_serialized_field_names_match_project_format() {
        let project = ProjectState::new();
        let value = serde_json::to_value(&project).unwrap();
        assert!(value.get("tracks").is_some());
        assert!(value.get("image_overlays").is_some());
        assert!(value.get("text_overlays").is_some());
        assert!(value.get("active_track_index").is_some());
    }
}
