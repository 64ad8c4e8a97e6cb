//! Subtitle Segment and Track Models
//!
//! A track keeps its segments sorted by `start_ms` and non-overlapping.
//! Every mutator either succeeds or leaves the track untouched, so the
//! command layer can rely on atomic rejection.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::style::SubtitleStyle;
use crate::time::TimeMs;

/// Maximum gap between two segments that can still be merged.
pub const MERGE_GAP_MS: TimeMs = 500;

// =============================================================================
// Subtitle Segment
// =============================================================================

/// A single subtitle interval with text and optional per-segment
/// style/volume/audio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub text: String,
    /// Per-segment style override. `None` = use the project default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<SubtitleStyle>,
    /// Path to a per-segment TTS clip, if one has been synthesised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    /// Playback/mix gain in `[0.0, 2.0]`.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Voice id used to synthesise this segment, for re-generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Speech-speed multiplier used to synthesise this segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

fn default_volume() -> f32 {
    1.0
}

impl SubtitleSegment {
    pub fn new(start_ms: TimeMs, end_ms: TimeMs, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            style: None,
            audio_file: None,
            volume: 1.0,
            voice: None,
            speed: None,
        }
    }

    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }

    /// Checks the segment's own time invariant: `0 <= start < end`.
    fn validate(&self) -> CoreResult<()> {
        if self.start_ms < 0 || self.start_ms >= self.end_ms {
            return Err(CoreError::OutOfRange(format!(
                "segment times {}~{}ms",
                self.start_ms, self.end_ms
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Subtitle Track
// =============================================================================

/// An ordered, non-overlapping collection of subtitle segments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct SubtitleTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub language: String,
    /// Merged TTS audio for the whole track, if synthesised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    /// Where the track's synthesised audio sits on the output timeline.
    #[serde(default)]
    pub audio_start_ms: TimeMs,
    #[serde(default)]
    pub audio_duration_ms: TimeMs,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub segments: Vec<SubtitleSegment>,
}

impl SubtitleTrack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the segment containing `ms` (half-open on the end), if any.
    ///
    /// O(log n): binary search on `start_ms`, then a single end check;
    /// valid because segments are sorted and disjoint.
    pub fn segment_at(&self, ms: TimeMs) -> Option<(usize, &SubtitleSegment)> {
        let idx = self.segments.partition_point(|s| s.start_ms <= ms);
        if idx == 0 {
            return None;
        }
        let candidate = &self.segments[idx - 1];
        if ms < candidate.end_ms {
            Some((idx - 1, candidate))
        } else {
            None
        }
    }

    /// Inserts a segment into sorted order, returning the insertion index.
    ///
    /// Fails with [`CoreError::Overlap`] if the segment collides with an
    /// existing one; the track is unchanged on failure.
    pub fn add_segment(&mut self, segment: SubtitleSegment) -> CoreResult<usize> {
        segment.validate()?;
        let idx = self
            .segments
            .partition_point(|s| s.start_ms < segment.start_ms);

        let overlaps_prev = idx > 0 && self.segments[idx - 1].end_ms > segment.start_ms;
        let overlaps_next =
            idx < self.segments.len() && self.segments[idx].start_ms < segment.end_ms;
        if overlaps_prev || overlaps_next {
            return Err(CoreError::Overlap {
                start_ms: segment.start_ms,
                end_ms: segment.end_ms,
            });
        }

        self.segments.insert(idx, segment);
        Ok(idx)
    }

    /// Removes and returns the segment at `index`.
    pub fn remove_segment(&mut self, index: usize) -> CoreResult<SubtitleSegment> {
        if index >= self.segments.len() {
            return Err(CoreError::NotFound(index));
        }
        Ok(self.segments.remove(index))
    }

    /// Shifts a segment by `delta_ms`, clamped to `[0, duration_ms]`.
    ///
    /// `duration_ms <= 0` means the timeline end is unknown and only the
    /// lower clamp applies. Rejected atomically if the moved segment would
    /// overlap a neighbor.
    pub fn move_segment(
        &mut self,
        index: usize,
        delta_ms: TimeMs,
        duration_ms: TimeMs,
    ) -> CoreResult<()> {
        let seg = self.segments.get(index).ok_or(CoreError::NotFound(index))?;
        let len = seg.duration_ms();

        let mut new_start = seg.start_ms + delta_ms;
        new_start = new_start.max(0);
        if duration_ms > 0 {
            new_start = new_start.min(duration_ms - len);
        }
        let new_end = new_start + len;

        if index > 0 && self.segments[index - 1].end_ms > new_start {
            return Err(CoreError::Overlap {
                start_ms: new_start,
                end_ms: new_end,
            });
        }
        if index + 1 < self.segments.len() && self.segments[index + 1].start_ms < new_end {
            return Err(CoreError::Overlap {
                start_ms: new_start,
                end_ms: new_end,
            });
        }

        let seg = &mut self.segments[index];
        seg.start_ms = new_start;
        seg.end_ms = new_end;
        Ok(())
    }

    /// Splits the segment at `index` into two at `at_ms`.
    ///
    /// Both halves copy the style and keep pointing at the original
    /// per-segment audio clip.
    pub fn split_segment(&mut self, index: usize, at_ms: TimeMs) -> CoreResult<()> {
        let seg = self.segments.get(index).ok_or(CoreError::NotFound(index))?;
        if at_ms <= seg.start_ms || at_ms >= seg.end_ms {
            return Err(CoreError::OutOfRange(format!(
                "split point {}ms outside segment {}~{}ms",
                at_ms, seg.start_ms, seg.end_ms
            )));
        }

        let mut second = seg.clone();
        second.start_ms = at_ms;
        self.segments[index].end_ms = at_ms;
        self.segments.insert(index + 1, second);
        Ok(())
    }

    /// Merges segments `index` and `index + 1`.
    ///
    /// Requires the pair to be adjacent with a gap of at most
    /// [`MERGE_GAP_MS`]. The merged text is `"{a}\n{b}"`; the first
    /// segment's style, audio, and volume win.
    pub fn merge_segments(&mut self, index: usize) -> CoreResult<()> {
        if index + 1 >= self.segments.len() {
            return Err(CoreError::NotFound(index + 1));
        }
        let gap = self.segments[index + 1].start_ms - self.segments[index].end_ms;
        if gap > MERGE_GAP_MS {
            return Err(CoreError::OutOfRange(format!(
                "gap of {}ms exceeds merge limit of {}ms",
                gap, MERGE_GAP_MS
            )));
        }

        let second = self.segments.remove(index + 1);
        let first = &mut self.segments[index];
        first.end_ms = second.end_ms;
        first.text = format!("{}\n{}", first.text, second.text);
        Ok(())
    }

    /// Shifts all `indices` by `delta_ms`, all-or-nothing.
    ///
    /// Builds the candidate segment list first and validates it as a
    /// whole, so a conflict anywhere rejects the entire batch.
    pub fn batch_shift(
        &mut self,
        indices: &[usize],
        delta_ms: TimeMs,
        duration_ms: TimeMs,
    ) -> CoreResult<()> {
        for &i in indices {
            if i >= self.segments.len() {
                return Err(CoreError::NotFound(i));
            }
        }

        let mut candidate = self.segments.clone();
        for &i in indices {
            let seg = &mut candidate[i];
            seg.start_ms += delta_ms;
            seg.end_ms += delta_ms;
            if seg.start_ms < 0 || (duration_ms > 0 && seg.end_ms > duration_ms) {
                return Err(CoreError::OutOfRange(format!(
                    "segment {} shifted to {}~{}ms",
                    i, seg.start_ms, seg.end_ms
                )));
            }
        }

        for pair in candidate.windows(2) {
            if pair[0].end_ms > pair[1].start_ms {
                return Err(CoreError::Overlap {
                    start_ms: pair[1].start_ms,
                    end_ms: pair[1].end_ms,
                });
            }
        }

        self.segments = candidate;
        Ok(())
    }

    /// Verifies the sorted-and-disjoint invariant. Used by tests and by
    /// the persistence layer after migration.
    pub fn is_well_formed(&self) -> bool {
        self.segments
            .windows(2)
            .all(|p| p[0].end_ms <= p[1].start_ms)
            && self.segments.iter().all(|s| s.validate().is_ok())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(segments: &[(TimeMs, TimeMs, &str)]) -> SubtitleTrack {
        let mut track = SubtitleTrack::new("Default");
        for &(start, end, text) in segments {
            track
                .add_segment(SubtitleSegment::new(start, end, text))
                .unwrap();
        }
        track
    }

    #[test]
    fn test_add_keeps_sorted_order() {
        let mut track = SubtitleTrack::new("Default");
        track
            .add_segment(SubtitleSegment::new(2000, 3000, "b"))
            .unwrap();
        let idx = track
            .add_segment(SubtitleSegment::new(0, 1000, "a"))
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(track.segments[0].text, "a");
        assert!(track.is_well_formed());
    }

    #[test]
    fn test_add_rejects_overlap() {
        let mut track = track_with(&[(0, 1000, "hi")]);
        let before = track.clone();

        let err = track
            .add_segment(SubtitleSegment::new(500, 1500, "x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Overlap { .. }));
        assert_eq!(track, before);
    }

    #[test]
    fn test_add_allows_touching_segments() {
        let mut track = track_with(&[(0, 1000, "a")]);
        track
            .add_segment(SubtitleSegment::new(1000, 2000, "b"))
            .unwrap();
        assert_eq!(track.len(), 2);
    }

    #[test]
    fn test_add_rejects_inverted_times() {
        let mut track = SubtitleTrack::new("Default");
        assert!(track
            .add_segment(SubtitleSegment::new(1000, 1000, "x"))
            .is_err());
        assert!(track
            .add_segment(SubtitleSegment::new(-5, 100, "x"))
            .is_err());
    }

    #[test]
    fn test_segment_at_half_open() {
        let track = track_with(&[(0, 1000, "a"), (2000, 3000, "b")]);
        assert_eq!(track.segment_at(0).unwrap().1.text, "a");
        assert_eq!(track.segment_at(999).unwrap().1.text, "a");
        assert!(track.segment_at(1000).is_none());
        assert_eq!(track.segment_at(2500).unwrap().0, 1);
        assert!(track.segment_at(3000).is_none());
    }

    #[test]
    fn test_move_segment_clamps_and_checks_neighbors() {
        let mut track = track_with(&[(1000, 2000, "a"), (3000, 4000, "b")]);

        // Clamp at zero
        track.move_segment(0, -5000, 10_000).unwrap();
        assert_eq!(track.segments[0].start_ms, 0);
        assert_eq!(track.segments[0].end_ms, 1000);

        // Rejected: would overlap the next segment
        let before = track.clone();
        assert!(track.move_segment(0, 2500, 10_000).is_err());
        assert_eq!(track, before);

        // Clamp at timeline end
        track.move_segment(1, 50_000, 10_000).unwrap();
        assert_eq!(track.segments[1].end_ms, 10_000);
    }

    #[test]
    fn test_split_segment() {
        let mut track = track_with(&[(0, 4000, "hello world")]);
        track.split_segment(0, 2000).unwrap();

        assert_eq!(track.len(), 2);
        assert_eq!(track.segments[0].start_ms, 0);
        assert_eq!(track.segments[0].end_ms, 2000);
        assert_eq!(track.segments[1].start_ms, 2000);
        assert_eq!(track.segments[1].end_ms, 4000);
        assert_eq!(track.segments[0].text, "hello world");
        assert_eq!(track.segments[1].text, "hello world");
    }

    #[test]
    fn test_split_copies_style_and_audio() {
        let mut track = SubtitleTrack::new("Default");
        let mut seg = SubtitleSegment::new(0, 4000, "styled");
        seg.style = Some(SubtitleStyle::new().with_font_size(32));
        seg.audio_file = Some("/tmp/seg.mp3".to_string());
        track.add_segment(seg).unwrap();

        track.split_segment(0, 1500).unwrap();
        assert_eq!(track.segments[1].style.as_ref().unwrap().font_size, 32);
        assert_eq!(
            track.segments[1].audio_file.as_deref(),
            Some("/tmp/seg.mp3")
        );
    }

    #[test]
    fn test_split_rejects_edges() {
        let mut track = track_with(&[(0, 4000, "x")]);
        assert!(track.split_segment(0, 0).is_err());
        assert!(track.split_segment(0, 4000).is_err());
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_merge_within_gap() {
        let mut track = track_with(&[(0, 1000, "a"), (1400, 2000, "b")]);
        track.merge_segments(0).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.segments[0].end_ms, 2000);
        assert_eq!(track.segments[0].text, "a\nb");
    }

    #[test]
    fn test_merge_rejects_wide_gap() {
        let mut track = track_with(&[(0, 1000, "a"), (1600, 2000, "b")]);
        assert!(track.merge_segments(0).is_err());
        assert_eq!(track.len(), 2);
    }

    #[test]
    fn test_batch_shift_all_or_nothing() {
        let mut track = track_with(&[(0, 1000, "a"), (2000, 3000, "b"), (4000, 5000, "c")]);
        let before = track.clone();

        // Shifting b and c right by 500 is fine
        track.batch_shift(&[1, 2], 500, 10_000).unwrap();
        assert_eq!(track.segments[1].start_ms, 2500);
        assert_eq!(track.segments[2].start_ms, 4500);

        // Shifting only c left onto b must reject without touching anything
        track = before.clone();
        assert!(track.batch_shift(&[2], -1500, 10_000).is_err());
        assert_eq!(track, before);
    }

    #[test]
    fn test_batch_shift_rejects_out_of_range() {
        let mut track = track_with(&[(0, 1000, "a")]);
        assert!(track.batch_shift(&[0], -500, 10_000).is_err());
        assert!(track.batch_shift(&[0], 9500, 10_000).is_err());
        assert!(track.batch_shift(&[5], 100, 10_000).is_err());
    }

    #[test]
    fn test_segment_serialization_defaults() {
        let seg = SubtitleSegment::new(0, 1000, "hi");
        let json = serde_json::to_value(&seg).unwrap();
        // Unset options stay off the wire
        assert!(json.get("style").is_none());
        assert!(json.get("audio_file").is_none());

        let parsed: SubtitleSegment =
            serde_json::from_str(r#"{"start_ms":0,"end_ms":1000,"text":"hi"}"#).unwrap();
        assert_eq!(parsed.volume, 1.0);
    }
}
