//! Image and Text Overlay Models
//!
//! Overlays are time-gated items composited over the video canvas.
//! Unlike subtitle segments they may overlap in time; they stack
//! visually in track order.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::style::SubtitleStyle;
use crate::time::TimeMs;

// =============================================================================
// Image Overlay (PIP)
// =============================================================================

/// A picture-in-picture image with a time window and a canvas anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub image_path: String,
    /// Left edge as % of video width (0-100).
    #[serde(default = "default_x_percent")]
    pub x_percent: f32,
    /// Top edge as % of video height (0-100).
    #[serde(default = "default_y_percent")]
    pub y_percent: f32,
    /// Image width as % of video width (1-100).
    #[serde(default = "default_scale_percent")]
    pub scale_percent: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_x_percent() -> f32 {
    70.0
}

fn default_y_percent() -> f32 {
    10.0
}

fn default_scale_percent() -> f32 {
    25.0
}

fn default_opacity() -> f32 {
    1.0
}

impl ImageOverlay {
    pub fn new(start_ms: TimeMs, end_ms: TimeMs, image_path: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            image_path: image_path.into(),
            x_percent: default_x_percent(),
            y_percent: default_y_percent(),
            scale_percent: default_scale_percent(),
            opacity: default_opacity(),
        }
    }

    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }

    fn validate(&self) -> CoreResult<()> {
        if self.start_ms < 0 || self.end_ms <= self.start_ms {
            return Err(CoreError::OutOfRange(format!(
                "overlay times {}~{}ms",
                self.start_ms, self.end_ms
            )));
        }
        Ok(())
    }
}

/// Image overlays sorted by `start_ms`; time overlaps are permitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "ImageOverlayTrackData")]
pub struct ImageOverlayTrack {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub overlays: Vec<ImageOverlay>,
}

/// Accepts both the current object shape and the bare-array shape of
/// older project files.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImageOverlayTrackData {
    Full {
        #[serde(default)]
        locked: bool,
        #[serde(default)]
        hidden: bool,
        #[serde(default, alias = "items")]
        overlays: Vec<ImageOverlay>,
    },
    Items(Vec<ImageOverlay>),
}

impl From<ImageOverlayTrackData> for ImageOverlayTrack {
    fn from(data: ImageOverlayTrackData) -> Self {
        match data {
            ImageOverlayTrackData::Full {
                locked,
                hidden,
                overlays,
            } => Self {
                locked,
                hidden,
                overlays,
            },
            ImageOverlayTrackData::Items(overlays) => Self {
                locked: false,
                hidden: false,
                overlays,
            },
        }
    }
}

impl ImageOverlayTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Inserts in sorted order by `start_ms`, returning the index.
    pub fn add_overlay(&mut self, overlay: ImageOverlay) -> CoreResult<usize> {
        overlay.validate()?;
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms <= overlay.start_ms);
        self.overlays.insert(idx, overlay);
        Ok(idx)
    }

    pub fn remove_overlay(&mut self, index: usize) -> CoreResult<ImageOverlay> {
        if index >= self.overlays.len() {
            return Err(CoreError::NotFound(index));
        }
        Ok(self.overlays.remove(index))
    }

    /// All overlays active at `ms`, in stacking (track) order.
    ///
    /// Binary search bounds the scan to overlays starting at or before
    /// `ms`; overlaps are allowed so each candidate's end is checked.
    pub fn overlays_at(&self, ms: TimeMs) -> Vec<&ImageOverlay> {
        let idx = self.overlays.partition_point(|o| o.start_ms <= ms);
        self.overlays[..idx]
            .iter()
            .filter(|o| o.end_ms > ms)
            .collect()
    }

    /// Moves an overlay in time and/or space, re-sorting as needed.
    pub fn update_overlay(&mut self, index: usize, updated: ImageOverlay) -> CoreResult<()> {
        if index >= self.overlays.len() {
            return Err(CoreError::NotFound(index));
        }
        updated.validate()?;
        self.overlays.remove(index);
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms <= updated.start_ms);
        self.overlays.insert(idx, updated);
        Ok(())
    }
}

// =============================================================================
// Text Overlay
// =============================================================================

/// Horizontal text alignment relative to the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical text alignment relative to the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextVAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// A free-standing text item, independent of the subtitle tracks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub text: String,
    /// Anchor X as % of video width (0-100).
    #[serde(default = "default_anchor")]
    pub x_percent: f32,
    /// Anchor Y as % of video height (0-100).
    #[serde(default = "default_anchor")]
    pub y_percent: f32,
    #[serde(default)]
    pub alignment: TextAlignment,
    #[serde(default)]
    pub v_alignment: TextVAlignment,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// `None` = project default style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<SubtitleStyle>,
}

fn default_anchor() -> f32 {
    50.0
}

impl TextOverlay {
    pub fn new(start_ms: TimeMs, end_ms: TimeMs, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            x_percent: default_anchor(),
            y_percent: default_anchor(),
            alignment: TextAlignment::Center,
            v_alignment: TextVAlignment::Middle,
            opacity: default_opacity(),
            style: None,
        }
    }

    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }

    fn validate(&self) -> CoreResult<()> {
        if self.start_ms < 0 || self.end_ms <= self.start_ms {
            return Err(CoreError::OutOfRange(format!(
                "text overlay times {}~{}ms",
                self.start_ms, self.end_ms
            )));
        }
        Ok(())
    }
}

/// Text overlays sorted by `start_ms`; overlaps permitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "TextOverlayTrackData")]
pub struct TextOverlayTrack {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub overlays: Vec<TextOverlay>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOverlayTrackData {
    Full {
        #[serde(default)]
        locked: bool,
        #[serde(default)]
        hidden: bool,
        #[serde(default, alias = "items")]
        overlays: Vec<TextOverlay>,
    },
    Items(Vec<TextOverlay>),
}

impl From<TextOverlayTrackData> for TextOverlayTrack {
    fn from(data: TextOverlayTrackData) -> Self {
        match data {
            TextOverlayTrackData::Full {
                locked,
                hidden,
                overlays,
            } => Self {
                locked,
                hidden,
                overlays,
            },
            TextOverlayTrackData::Items(overlays) => Self {
                locked: false,
                hidden: false,
                overlays,
            },
        }
    }
}

impl TextOverlayTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn add_overlay(&mut self, overlay: TextOverlay) -> CoreResult<usize> {
        overlay.validate()?;
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms <= overlay.start_ms);
        self.overlays.insert(idx, overlay);
        Ok(idx)
    }

    pub fn remove_overlay(&mut self, index: usize) -> CoreResult<TextOverlay> {
        if index >= self.overlays.len() {
            return Err(CoreError::NotFound(index));
        }
        Ok(self.overlays.remove(index))
    }

    pub fn update_overlay(&mut self, index: usize, updated: TextOverlay) -> CoreResult<()> {
        if index >= self.overlays.len() {
            return Err(CoreError::NotFound(index));
        }
        updated.validate()?;
        self.overlays.remove(index);
        let idx = self
            .overlays
            .partition_point(|o| o.start_ms <= updated.start_ms);
        self.overlays.insert(idx, updated);
        Ok(())
    }

    pub fn overlays_at(&self, ms: TimeMs) -> Vec<&TextOverlay> {
        let idx = self.overlays.partition_point(|o| o.start_ms <= ms);
        self.overlays[..idx]
            .iter()
            .filter(|o| o.end_ms > ms)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_sorted_allows_overlap() {
        let mut track = ImageOverlayTrack::new();
        track
            .add_overlay(ImageOverlay::new(2000, 4000, "logo.png"))
            .unwrap();
        let idx = track
            .add_overlay(ImageOverlay::new(1000, 3000, "badge.png"))
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(track.overlays[0].image_path, "badge.png");
    }

    #[test]
    fn test_overlays_at_stacking() {
        let mut track = ImageOverlayTrack::new();
        track
            .add_overlay(ImageOverlay::new(0, 5000, "a.png"))
            .unwrap();
        track
            .add_overlay(ImageOverlay::new(1000, 3000, "b.png"))
            .unwrap();

        let active = track.overlays_at(2000);
        assert_eq!(active.len(), 2);
        let active = track.overlays_at(4000);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].image_path, "a.png");
        assert!(track.overlays_at(5000).is_empty());
    }

    #[test]
    fn test_rejects_empty_window() {
        let mut track = ImageOverlayTrack::new();
        assert!(track
            .add_overlay(ImageOverlay::new(1000, 1000, "x.png"))
            .is_err());
    }

    #[test]
    fn test_update_resorts() {
        let mut track = ImageOverlayTrack::new();
        track
            .add_overlay(ImageOverlay::new(0, 1000, "a.png"))
            .unwrap();
        track
            .add_overlay(ImageOverlay::new(2000, 3000, "b.png"))
            .unwrap();

        let mut moved = track.overlays[0].clone();
        moved.start_ms = 5000;
        moved.end_ms = 6000;
        track.update_overlay(0, moved).unwrap();
        assert_eq!(track.overlays[0].image_path, "b.png");
        assert_eq!(track.overlays[1].image_path, "a.png");
    }

    #[test]
    fn test_text_overlay_defaults() {
        let overlay = TextOverlay::new(0, 2000, "Hello");
        assert_eq!(overlay.x_percent, 50.0);
        assert_eq!(overlay.alignment, TextAlignment::Center);
        assert_eq!(overlay.v_alignment, TextVAlignment::Middle);
        assert!(overlay.style.is_none());
    }

    #[test]
    fn test_text_track_round_trip() {
        let mut track = TextOverlayTrack::new();
        track.add_overlay(TextOverlay::new(0, 2000, "Hi")).unwrap();
        let json = serde_json::to_string(&track).unwrap();
        let parsed: TextOverlayTrack = serde_json::from_str(&json).unwrap();
        assert_eq!(track, parsed);
    }

    #[test]
    fn test_alignment_serializes_lowercase() {
        let json = serde_json::to_string(&TextAlignment::Left).unwrap();
        assert_eq!(json, "\"left\"");
        let json = serde_json::to_string(&TextVAlignment::Bottom).unwrap();
        assert_eq!(json, "\"bottom\"");
    }
}
