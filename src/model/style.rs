//! Subtitle Style Model
//!
//! Visual style for subtitle rendering. A style lives on the project as the
//! default and optionally on individual segments as an override.

use serde::{Deserialize, Serialize};

/// Anchor position for rendered subtitles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StylePosition {
    #[default]
    #[serde(rename = "bottom-center")]
    BottomCenter,
    #[serde(rename = "top-center")]
    TopCenter,
    #[serde(rename = "bottom-left")]
    BottomLeft,
    #[serde(rename = "bottom-right")]
    BottomRight,
    #[serde(rename = "custom")]
    Custom,
}

/// Visual style for subtitle rendering.
///
/// Colors are `#RRGGBB` strings; an empty `bg_color` means transparent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_true")]
    pub font_bold: bool,
    #[serde(default)]
    pub font_italic: bool,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,
    #[serde(default)]
    pub bg_color: String,
    #[serde(default)]
    pub position: StylePosition,
    #[serde(default = "default_margin_bottom")]
    pub margin_bottom: u32,
    /// Horizontal anchor as a fraction of canvas width, used when
    /// `position` is `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_x: Option<f32>,
    /// Vertical anchor as a fraction of canvas height, used when
    /// `position` is `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_y: Option<f32>,
}

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    18
}

fn default_true() -> bool {
    true
}

fn default_font_color() -> String {
    "#FFFFFF".to_string()
}

fn default_outline_color() -> String {
    "#000000".to_string()
}

fn default_outline_width() -> u32 {
    1
}

fn default_margin_bottom() -> u32 {
    40
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: default_font_size(),
            font_bold: true,
            font_italic: false,
            font_color: default_font_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
            bg_color: String::new(),
            position: StylePosition::BottomCenter,
            margin_bottom: default_margin_bottom(),
            custom_x: None,
            custom_y: None,
        }
    }
}

impl SubtitleStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the font family.
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    /// Sets the font size in points.
    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = size.clamp(1, 500);
        self
    }

    /// Sets the text color.
    pub fn with_font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = color.into();
        self
    }

    /// Sets the anchor position.
    pub fn with_position(mut self, position: StylePosition) -> Self {
        self.position = position;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style() {
        let style = SubtitleStyle::default();
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.font_size, 18);
        assert!(style.font_bold);
        assert_eq!(style.position, StylePosition::BottomCenter);
        assert!(style.custom_x.is_none());
    }

    #[test]
    fn test_position_serializes_as_kebab() {
        let json = serde_json::to_string(&StylePosition::BottomCenter).unwrap();
        assert_eq!(json, "\"bottom-center\"");
        let parsed: StylePosition = serde_json::from_str("\"top-center\"").unwrap();
        assert_eq!(parsed, StylePosition::TopCenter);
    }

    #[test]
    fn test_style_round_trip() {
        let style = SubtitleStyle::new()
            .with_font_family("Georgia")
            .with_font_size(24)
            .with_position(StylePosition::Custom);
        let json = serde_json::to_string(&style).unwrap();
        let parsed: SubtitleStyle = serde_json::from_str(&json).unwrap();
        assert_eq!(style, parsed);
    }

    #[test]
    fn test_style_deserializes_from_partial_json() {
        let parsed: SubtitleStyle = serde_json::from_str(r#"{"font_size": 32}"#).unwrap();
        assert_eq!(parsed.font_size, 32);
        assert_eq!(parsed.font_family, "Arial");
        assert_eq!(parsed.margin_bottom, 40);
    }
}
