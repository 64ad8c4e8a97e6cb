//! Timeline Coordinate Engine
//!
//! One coherent output-timeline abstraction shared by the player, the UI,
//! and the exporter. Without a clip track the output timeline equals the
//! primary video; with one it is the concatenated clip durations adjusted
//! by transitions.
//!
//! The engine keeps an explicit playback cursor `(clip_index, source_ms)`.
//! Advancing consults the cursor rather than reverse-mapping from source
//! time, because distinct clips may play the same source file and the
//! reverse mapping would pick the wrong index.

use serde::{Deserialize, Serialize};

use crate::model::ProjectState;
use crate::time::TimeMs;

/// Drift tolerance when detecting clip-boundary crossings during playback.
pub const BOUNDARY_EPSILON_MS: TimeMs = 30;

// =============================================================================
// Cursor Types
// =============================================================================

/// Playback cursor: which clip is playing and where in its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCursor {
    pub clip_index: usize,
    pub source_ms: TimeMs,
}

/// A detected clip switch, telling the player where to seek next.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryCrossing {
    pub from_clip: usize,
    pub to_clip: usize,
    /// Source file of the clip being entered (`None` = primary video).
    pub source_path: Option<String>,
    /// Source position the player must seek to in that file.
    pub source_seek_ms: TimeMs,
}

/// Result of advancing the engine by a wallclock delta.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineTick {
    /// New output-timeline position.
    pub position_ms: TimeMs,
    /// Cursor after the tick, absent when no clip track exists.
    pub cursor: Option<TimelineCursor>,
    /// Set when the tick crossed into another clip.
    pub crossing: Option<BoundaryCrossing>,
    /// True when playback reached the end of the output timeline.
    pub ended: bool,
}

// =============================================================================
// Timeline Engine
// =============================================================================

/// Tracks the playback position on the output timeline.
#[derive(Clone, Debug, Default)]
pub struct TimelineEngine {
    position_ms: TimeMs,
    cursor: Option<TimelineCursor>,
}

impl TimelineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_ms(&self) -> TimeMs {
        self.position_ms
    }

    pub fn cursor(&self) -> Option<TimelineCursor> {
        self.cursor
    }

    /// Seeks to an output-timeline position, clamped to
    /// `[0, output_duration]`. The cursor is updated before the new
    /// position is returned, so notifications always observe a coherent
    /// pair.
    pub fn seek(&mut self, project: &ProjectState, t: TimeMs) -> TimeMs {
        let duration = project.output_duration_ms();
        self.position_ms = t.clamp(0, duration);
        self.cursor = self.cursor_at(project, self.position_ms);
        self.position_ms
    }

    /// Advances playback by a wallclock delta.
    ///
    /// Boundary crossings are detected with [`BOUNDARY_EPSILON_MS`] of
    /// tolerance: once the position comes within the epsilon of the
    /// current clip's end, the engine switches to the next clip instead
    /// of waiting for the exact boundary sample.
    pub fn advance(&mut self, project: &ProjectState, delta_ms: TimeMs) -> TimelineTick {
        let duration = project.output_duration_ms();
        let new_position = (self.position_ms + delta_ms.max(0)).min(duration);

        let Some(track) = project.video_clip_track.as_ref().filter(|t| !t.is_empty()) else {
            // No clip track: the output timeline is the primary video.
            self.position_ms = new_position;
            self.cursor = None;
            return TimelineTick {
                position_ms: new_position,
                cursor: None,
                crossing: None,
                ended: new_position >= duration,
            };
        };

        let previous = self.cursor;
        let mut crossing = None;

        if new_position >= duration {
            self.position_ms = duration;
            self.cursor = None;
            return TimelineTick {
                position_ms: duration,
                cursor: None,
                crossing: None,
                ended: true,
            };
        }

        let clip_end = previous.and_then(|c| {
            let start = track.clip_timeline_start(c.clip_index).ok()?;
            Some(start + track.clip_output_duration(c.clip_index))
        });

        // Within epsilon of the current clip's end: jump to the next clip
        // start instead of reporting a position the player cannot decode.
        let effective = match clip_end {
            Some(end) if new_position + BOUNDARY_EPSILON_MS >= end => {
                end.min(duration.saturating_sub(1).max(0))
            }
            _ => new_position,
        };

        self.position_ms = effective.min(duration);
        self.cursor = self.cursor_at(project, self.position_ms);

        if let (Some(prev), Some(next)) = (previous, self.cursor) {
            if next.clip_index != prev.clip_index {
                let entered = &track.clips()[next.clip_index];
                tracing::debug!(
                    from = prev.clip_index,
                    to = next.clip_index,
                    "clip boundary crossed"
                );
                crossing = Some(BoundaryCrossing {
                    from_clip: prev.clip_index,
                    to_clip: next.clip_index,
                    source_path: entered.source_path.clone(),
                    source_seek_ms: next.source_ms,
                });
            }
        }

        TimelineTick {
            position_ms: self.position_ms,
            cursor: self.cursor,
            crossing,
            ended: self.position_ms >= duration,
        }
    }

    fn cursor_at(&self, project: &ProjectState, t: TimeMs) -> Option<TimelineCursor> {
        let track = project.video_clip_track.as_ref()?;
        let (clip_index, source_ms) = track.source_at_timeline(t)?;
        Some(TimelineCursor {
            clip_index,
            source_ms,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
