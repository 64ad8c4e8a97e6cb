//! Video Clip Models
//!
//! A clip track is an ordered sequence of half-open source windows whose
//! concatenation defines the output timeline. The track memoizes a
//! prefix-sum array of output durations so timeline-start lookup is O(1)
//! and containment queries are O(log n). Every mutator rebuilds the
//! prefix sums before returning.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::time::TimeMs;

/// Minimum source span a clip may be trimmed or split down to.
pub const MIN_CLIP_MS: TimeMs = 100;

// =============================================================================
// Transitions
// =============================================================================

/// Transition style between two adjacent clips, mapped to FFmpeg `xfade`
/// transition names at render time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    SlideLeft,
    SlideRight,
}

impl TransitionKind {
    /// The `xfade` filter's transition parameter value.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::SlideLeft => "slideleft",
            TransitionKind::SlideRight => "slideright",
        }
    }
}

/// An outgoing transition declared on a clip, applied at the boundary to
/// the next clip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub duration_ms: TimeMs,
    /// Whether the audio crossfades too; otherwise the audio cut stays
    /// hard at the collapsed boundary.
    #[serde(default)]
    pub audio_crossfade: bool,
}

// =============================================================================
// Video Clip
// =============================================================================

/// Per-clip color filters in calibrated FFmpeg `eq` ranges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct ClipFilters {
    /// Brightness offset in `[-1.0, 1.0]`, 0 = unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    /// Contrast multiplier in `[0.0, 2.0]`, 1 = unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    /// Saturation multiplier in `[0.0, 3.0]`, 1 = unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
}

impl ClipFilters {
    pub fn is_identity(&self) -> bool {
        self.brightness.is_none() && self.contrast.is_none() && self.saturation.is_none()
    }
}

/// A half-open `[source_in_ms, source_out_ms)` window over a source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub source_in_ms: TimeMs,
    pub source_out_ms: TimeMs,
    /// Source file for this clip. `None` = the primary project video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "ClipFilters::is_identity")]
    pub filters: ClipFilters,
    /// Outgoing transition to the next clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl VideoClip {
    pub fn new(source_in_ms: TimeMs, source_out_ms: TimeMs) -> Self {
        Self {
            source_in_ms,
            source_out_ms,
            source_path: None,
            filters: ClipFilters::default(),
            transition: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    /// Source-window length, before any transition collapsing.
    pub fn duration_ms(&self) -> TimeMs {
        self.source_out_ms - self.source_in_ms
    }

    fn validate(&self) -> CoreResult<()> {
        if self.source_in_ms < 0 || self.source_in_ms >= self.source_out_ms {
            return Err(CoreError::OutOfRange(format!(
                "clip source window {}~{}ms",
                self.source_in_ms, self.source_out_ms
            )));
        }
        Ok(())
    }

    /// True when this clip plays the same source as the query.
    /// `None` matches only clips of the primary project video.
    fn matches_source(&self, source: Option<&str>) -> bool {
        self.source_path.as_deref() == source
    }
}

/// Which edge of a clip a trim applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipEdge {
    Left,
    Right,
}

// =============================================================================
// Video Clip Track
// =============================================================================

/// Ordered clips defining the output timeline, with memoized prefix sums.
///
/// `offsets[i]` is the output-timeline start of clip `i`;
/// `offsets[len]` is the total output duration. Transitions collapse each
/// boundary by their duration (half deducted from each side).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "VideoClipTrackData")]
pub struct VideoClipTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub hidden: bool,
    clips: Vec<VideoClip>,
    #[serde(skip)]
    offsets: Vec<TimeMs>,
}

/// Serde mirror: rebuilds the derived prefix sums after deserialization.
/// Also accepts the bare-array shape older project files used.
#[derive(Deserialize)]
#[serde(untagged)]
enum VideoClipTrackData {
    Full {
        #[serde(default)]
        name: String,
        #[serde(default)]
        locked: bool,
        #[serde(default)]
        muted: bool,
        #[serde(default)]
        hidden: bool,
        #[serde(default, alias = "items")]
        clips: Vec<VideoClip>,
    },
    Clips(Vec<VideoClip>),
}

impl From<VideoClipTrackData> for VideoClipTrack {
    fn from(data: VideoClipTrackData) -> Self {
        let mut track = match data {
            VideoClipTrackData::Full {
                name,
                locked,
                muted,
                hidden,
                clips,
            } => VideoClipTrack {
                name,
                locked,
                muted,
                hidden,
                clips,
                offsets: Vec::new(),
            },
            VideoClipTrackData::Clips(clips) => VideoClipTrack {
                clips,
                offsets: Vec::new(),
                ..VideoClipTrack::default()
            },
        };
        track.rebuild_offsets();
        track
    }
}

impl Default for VideoClipTrack {
    fn default() -> Self {
        Self {
            name: String::new(),
            locked: false,
            muted: false,
            hidden: false,
            clips: Vec::new(),
            offsets: vec![0],
        }
    }
}

impl VideoClipTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a track with one clip spanning the full primary video.
    pub fn from_full_video(duration_ms: TimeMs) -> Self {
        let mut track = Self::new();
        if duration_ms > 0 {
            track.clips.push(VideoClip::new(0, duration_ms));
            track.rebuild_offsets();
        }
        track
    }

    pub fn from_clips(clips: Vec<VideoClip>) -> CoreResult<Self> {
        for clip in &clips {
            clip.validate()?;
        }
        let mut track = Self::new();
        track.clips = clips;
        track.rebuild_offsets();
        Ok(track)
    }

    pub fn clips(&self) -> &[VideoClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// True when the track is a single clip covering the full source.
    pub fn is_full_video(&self, source_duration_ms: TimeMs) -> bool {
        match self.clips.as_slice() {
            [only] => {
                only.source_path.is_none()
                    && only.source_in_ms == 0
                    && only.source_out_ms == source_duration_ms
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Derived prefix sums
    // ------------------------------------------------------------------

    /// Transition collapse charged to the left (`d/2`) and right
    /// (`d - d/2`) clips at boundary `i -> i+1`, so the two halves always
    /// sum to the full duration in integer math.
    fn outgoing_deduct(&self, index: usize) -> TimeMs {
        self.clips[index]
            .transition
            .map(|t| t.duration_ms / 2)
            .unwrap_or(0)
    }

    fn incoming_deduct(&self, index: usize) -> TimeMs {
        if index == 0 {
            return 0;
        }
        self.clips[index - 1]
            .transition
            .map(|t| t.duration_ms - t.duration_ms / 2)
            .unwrap_or(0)
    }

    /// Output-timeline duration of clip `index` after transition collapse.
    pub fn clip_output_duration(&self, index: usize) -> TimeMs {
        let clip = &self.clips[index];
        let deduct = self.incoming_deduct(index)
            + if index + 1 < self.clips.len() {
                self.outgoing_deduct(index)
            } else {
                0
            };
        (clip.duration_ms() - deduct).max(0)
    }

    fn rebuild_offsets(&mut self) {
        self.offsets.clear();
        self.offsets.push(0);
        let mut acc = 0;
        for i in 0..self.clips.len() {
            acc += self.clip_output_duration(i);
            self.offsets.push(acc);
        }
    }

    /// Total output timeline length.
    pub fn output_duration_ms(&self) -> TimeMs {
        *self.offsets.last().unwrap_or(&0)
    }

    #[cfg(test)]
    pub(crate) fn offsets(&self) -> &[TimeMs] {
        &self.offsets
    }

    // ------------------------------------------------------------------
    // Time mapping
    // ------------------------------------------------------------------

    /// Returns `(index, clip, local_offset)` for the clip containing the
    /// output-timeline position `t`, or `None` past the end.
    ///
    /// O(log n) via binary search on the prefix sums.
    pub fn clip_at_timeline(&self, t: TimeMs) -> Option<(usize, &VideoClip, TimeMs)> {
        if t < 0 || t >= self.output_duration_ms() || self.clips.is_empty() {
            return None;
        }
        // Largest i with offsets[i] <= t
        let idx = self.offsets.partition_point(|&off| off <= t) - 1;
        let idx = idx.min(self.clips.len() - 1);
        Some((idx, &self.clips[idx], t - self.offsets[idx]))
    }

    /// Output-timeline start of clip `index`, O(1).
    pub fn clip_timeline_start(&self, index: usize) -> CoreResult<TimeMs> {
        if index >= self.clips.len() {
            return Err(CoreError::NotFound(index));
        }
        Ok(self.offsets[index])
    }

    /// Source position played at output-timeline position `t`.
    pub fn source_at_timeline(&self, t: TimeMs) -> Option<(usize, TimeMs)> {
        let (idx, clip, local) = self.clip_at_timeline(t)?;
        Some((idx, clip.source_in_ms + self.incoming_deduct(idx) + local))
    }

    /// Maps a `(source, source_ms)` pair back to the output timeline.
    ///
    /// A source of `None` selects clips playing the primary project
    /// video. When the pair is contained by more than one clip the caller
    /// must pass the expected clip index as `hint`; without one the call
    /// fails with [`CoreError::AmbiguousSource`]. A hint that does not
    /// contain the pair fails with [`CoreError::NotFound`].
    pub fn source_to_timeline(
        &self,
        source: Option<&str>,
        source_ms: TimeMs,
        hint: Option<usize>,
    ) -> CoreResult<TimeMs> {
        if let Some(index) = hint {
            if index >= self.clips.len() || !self.clip_contains_source(index, source, source_ms) {
                return Err(CoreError::NotFound(index));
            }
            return Ok(self.timeline_for_source(index, source_ms));
        }

        let mut found: Option<usize> = None;
        for index in 0..self.clips.len() {
            if self.clip_contains_source(index, source, source_ms) {
                if found.is_some() {
                    return Err(CoreError::AmbiguousSource);
                }
                found = Some(index);
            }
        }
        match found {
            Some(index) => Ok(self.timeline_for_source(index, source_ms)),
            None => Err(CoreError::OutOfRange(format!(
                "source position {}ms is not in any clip",
                source_ms
            ))),
        }
    }

    /// Whether clip `index` plays `source_ms` of `source` in its visible
    /// (post-collapse) window.
    fn clip_contains_source(&self, index: usize, source: Option<&str>, source_ms: TimeMs) -> bool {
        let clip = &self.clips[index];
        if !clip.matches_source(source) {
            return false;
        }
        let visible_in = clip.source_in_ms + self.incoming_deduct(index);
        let visible_out = visible_in + self.clip_output_duration(index);
        source_ms >= visible_in && source_ms < visible_out
    }

    fn timeline_for_source(&self, index: usize, source_ms: TimeMs) -> TimeMs {
        let clip = &self.clips[index];
        self.offsets[index] + (source_ms - clip.source_in_ms - self.incoming_deduct(index))
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Appends a clip, returning its index.
    pub fn add_clip(&mut self, clip: VideoClip) -> CoreResult<usize> {
        clip.validate()?;
        self.clips.push(clip);
        self.rebuild_offsets();
        Ok(self.clips.len() - 1)
    }

    /// Inserts a clip at `index`.
    pub fn insert_clip(&mut self, index: usize, clip: VideoClip) -> CoreResult<()> {
        if index > self.clips.len() {
            return Err(CoreError::NotFound(index));
        }
        clip.validate()?;
        self.clips.insert(index, clip);
        self.revalidate_transitions();
        self.rebuild_offsets();
        Ok(())
    }

    /// Removes and returns the clip at `index`. The last remaining clip
    /// cannot be removed.
    pub fn remove_clip(&mut self, index: usize) -> CoreResult<VideoClip> {
        if index >= self.clips.len() {
            return Err(CoreError::NotFound(index));
        }
        if self.clips.len() <= 1 {
            return Err(CoreError::OutOfRange(
                "cannot remove the last clip".to_string(),
            ));
        }
        let removed = self.clips.remove(index);
        self.revalidate_transitions();
        self.rebuild_offsets();
        Ok(removed)
    }

    /// Splits the clip at output-timeline position `t` into two.
    ///
    /// Rejected within [`MIN_CLIP_MS`] of either edge. The outgoing
    /// transition stays with the second half; returns the index of the
    /// first half.
    pub fn split_clip_at_timeline(&mut self, t: TimeMs) -> CoreResult<usize> {
        let (idx, clip, local) = self
            .clip_at_timeline(t)
            .ok_or_else(|| CoreError::OutOfRange(format!("timeline position {}ms", t)))?;

        let source_split = clip.source_in_ms + self.incoming_deduct(idx) + local;
        if source_split - clip.source_in_ms < MIN_CLIP_MS
            || clip.source_out_ms - source_split < MIN_CLIP_MS
        {
            return Err(CoreError::OutOfRange(format!(
                "split point {}ms too close to a clip edge",
                t
            )));
        }

        let mut second = self.clips[idx].clone();
        second.source_in_ms = source_split;
        let first = &mut self.clips[idx];
        first.source_out_ms = source_split;
        first.transition = None;
        self.clips.insert(idx + 1, second);
        self.revalidate_transitions();
        self.rebuild_offsets();
        Ok(idx)
    }

    /// Adjusts one source edge of a clip by `delta_ms`, clamped so at
    /// least [`MIN_CLIP_MS`] of source remains and `source_in >= 0`.
    pub fn trim_clip_edge(&mut self, index: usize, edge: ClipEdge, delta_ms: TimeMs) -> CoreResult<()> {
        let clip = self.clips.get_mut(index).ok_or(CoreError::NotFound(index))?;
        match edge {
            ClipEdge::Left => {
                let new_in = (clip.source_in_ms + delta_ms)
                    .max(0)
                    .min(clip.source_out_ms - MIN_CLIP_MS);
                clip.source_in_ms = new_in;
            }
            ClipEdge::Right => {
                let new_out = (clip.source_out_ms + delta_ms).max(clip.source_in_ms + MIN_CLIP_MS);
                clip.source_out_ms = new_out;
            }
        }
        self.revalidate_transitions();
        self.rebuild_offsets();
        Ok(())
    }

    /// Sets or clears the outgoing transition on clip `index`.
    ///
    /// A transition needs a following clip and must fit inside both
    /// neighbors' source windows.
    pub fn set_transition(&mut self, index: usize, transition: Option<Transition>) -> CoreResult<()> {
        if index >= self.clips.len() {
            return Err(CoreError::NotFound(index));
        }
        if let Some(t) = transition {
            if index + 1 >= self.clips.len() {
                return Err(CoreError::OutOfRange(
                    "transition on the last clip has no next clip".to_string(),
                ));
            }
            let limit = self.clips[index]
                .duration_ms()
                .min(self.clips[index + 1].duration_ms());
            if t.duration_ms <= 0 || t.duration_ms > limit {
                return Err(CoreError::OutOfRange(format!(
                    "transition duration {}ms exceeds clip limit {}ms",
                    t.duration_ms, limit
                )));
            }
        }
        self.clips[index].transition = transition;
        self.rebuild_offsets();
        Ok(())
    }

    /// Sets the per-clip color filters.
    pub fn set_filters(&mut self, index: usize, filters: ClipFilters) -> CoreResult<()> {
        let clip = self.clips.get_mut(index).ok_or(CoreError::NotFound(index))?;
        clip.filters = filters;
        Ok(())
    }

    /// Drops transitions that no longer have a next clip or no longer fit
    /// their neighbors after a structural edit.
    fn revalidate_transitions(&mut self) {
        let len = self.clips.len();
        for i in 0..len {
            let Some(t) = self.clips[i].transition else {
                continue;
            };
            let valid = i + 1 < len
                && t.duration_ms <= self.clips[i].duration_ms().min(self.clips[i + 1].duration_ms());
            if !valid {
                tracing::debug!("dropping transition on clip {} after edit", i);
                self.clips[i].transition = None;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_source_track() -> VideoClipTrack {
        // A(0~10s of A.mp4), B(0~5s of B.mp4), A(10~20s of A.mp4)
        VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 10_000).with_source("A.mp4"),
            VideoClip::new(0, 5000).with_source("B.mp4"),
            VideoClip::new(10_000, 20_000).with_source("A.mp4"),
        ])
        .unwrap()
    }

    #[test]
    fn test_offsets_and_total() {
        let track = multi_source_track();
        assert_eq!(track.offsets(), &[0, 10_000, 15_000, 25_000]);
        assert_eq!(track.output_duration_ms(), 25_000);
    }

    #[test]
    fn test_clip_at_timeline_multi_source() {
        let track = multi_source_track();

        let (i, clip, local) = track.clip_at_timeline(0).unwrap();
        assert_eq!((i, local), (0, 0));
        assert_eq!(clip.source_path.as_deref(), Some("A.mp4"));

        let (i, _, local) = track.clip_at_timeline(10_000).unwrap();
        assert_eq!((i, local), (1, 0));

        let (i, _, local) = track.clip_at_timeline(14_999).unwrap();
        assert_eq!((i, local), (1, 4999));

        let (i, clip, local) = track.clip_at_timeline(15_000).unwrap();
        assert_eq!((i, local), (2, 0));
        assert_eq!(clip.source_in_ms, 10_000);

        assert!(track.clip_at_timeline(25_000).is_none());
        assert!(track.clip_at_timeline(-1).is_none());
    }

    #[test]
    fn test_source_to_timeline_with_hint() {
        let track = multi_source_track();
        assert_eq!(
            track
                .source_to_timeline(Some("A.mp4"), 10_500, Some(2))
                .unwrap(),
            15_500
        );
        assert_eq!(
            track.source_to_timeline(Some("B.mp4"), 2500, None).unwrap(),
            12_500
        );
    }

    #[test]
    fn test_source_to_timeline_ambiguity() {
        // Same source window twice
        let track = VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 5000).with_source("A.mp4"),
            VideoClip::new(0, 5000).with_source("A.mp4"),
        ])
        .unwrap();

        assert!(matches!(
            track.source_to_timeline(Some("A.mp4"), 1000, None),
            Err(CoreError::AmbiguousSource)
        ));
        assert_eq!(
            track
                .source_to_timeline(Some("A.mp4"), 1000, Some(1))
                .unwrap(),
            6000
        );
        // Hint that does not contain the position
        assert!(track
            .source_to_timeline(Some("B.mp4"), 1000, Some(0))
            .is_err());
    }

    #[test]
    fn test_reverse_mapping_consistency() {
        let track = multi_source_track();
        for (i, source_ms) in [(0usize, 5000i64), (1, 2000), (2, 15_000)] {
            let source = track.clips()[i].source_path.clone();
            let t = track
                .source_to_timeline(source.as_deref(), source_ms, Some(i))
                .unwrap();
            let (found, _, _) = track.clip_at_timeline(t).unwrap();
            assert_eq!(found, i);
        }
    }

    #[test]
    fn test_primary_video_sentinel() {
        let track = VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 5000),
            VideoClip::new(0, 5000).with_source("B.mp4"),
        ])
        .unwrap();
        // None matches only the primary-video clip
        assert_eq!(track.source_to_timeline(None, 1000, None).unwrap(), 1000);
    }

    #[test]
    fn test_split_at_timeline() {
        let mut track = VideoClipTrack::from_full_video(10_000);
        let idx = track.split_clip_at_timeline(4000).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(track.len(), 2);
        assert_eq!(track.clips()[0].source_out_ms, 4000);
        assert_eq!(track.clips()[1].source_in_ms, 4000);
        assert_eq!(track.output_duration_ms(), 10_000);
    }

    #[test]
    fn test_split_rejects_near_edges() {
        let mut track = VideoClipTrack::from_full_video(10_000);
        assert!(track.split_clip_at_timeline(50).is_err());
        assert!(track.split_clip_at_timeline(9970).is_err());
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_remove_clip_keeps_last() {
        let mut track = VideoClipTrack::from_full_video(10_000);
        track.split_clip_at_timeline(5000).unwrap();
        track.remove_clip(0).unwrap();
        assert_eq!(track.len(), 1);
        assert!(track.remove_clip(0).is_err());
    }

    #[test]
    fn test_trim_clamps_to_min_clip() {
        let mut track = VideoClipTrack::from_full_video(10_000);
        track.trim_clip_edge(0, ClipEdge::Left, 20_000).unwrap();
        assert_eq!(track.clips()[0].source_in_ms, 10_000 - MIN_CLIP_MS);

        let mut track = VideoClipTrack::from_full_video(10_000);
        track.trim_clip_edge(0, ClipEdge::Right, -20_000).unwrap();
        assert_eq!(track.clips()[0].source_out_ms, MIN_CLIP_MS);
    }

    #[test]
    fn test_transition_collapses_duration() {
        let mut track = VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 10_000),
            VideoClip::new(10_000, 20_000),
        ])
        .unwrap();
        track
            .set_transition(
                0,
                Some(Transition {
                    kind: TransitionKind::Fade,
                    duration_ms: 1000,
                    audio_crossfade: false,
                }),
            )
            .unwrap();

        // 20s of material, 1s overlap
        assert_eq!(track.output_duration_ms(), 19_000);
        assert_eq!(track.offsets(), &[0, 9500, 19_000]);
        assert_eq!(track.clip_output_duration(0), 9500);
        assert_eq!(track.clip_output_duration(1), 9500);
    }

    #[test]
    fn test_transition_rejected_when_too_long() {
        let mut track = VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 1000),
            VideoClip::new(0, 10_000).with_source("B.mp4"),
        ])
        .unwrap();
        let t = Transition {
            kind: TransitionKind::Fade,
            duration_ms: 2000,
            audio_crossfade: false,
        };
        assert!(track.set_transition(0, Some(t)).is_err());
        assert!(track.set_transition(1, Some(t)).is_err()); // last clip
    }

    #[test]
    fn test_transition_dropped_after_removing_next_clip() {
        let mut track = VideoClipTrack::from_clips(vec![
            VideoClip::new(0, 10_000),
            VideoClip::new(10_000, 20_000),
        ])
        .unwrap();
        track
            .set_transition(
                0,
                Some(Transition {
                    kind: TransitionKind::Fade,
                    duration_ms: 1000,
                    audio_crossfade: true,
                }),
            )
            .unwrap();

        track.remove_clip(1).unwrap();
        assert!(track.clips()[0].transition.is_none());
        assert_eq!(track.output_duration_ms(), 10_000);
    }

    #[test]
    fn test_offsets_monotone_after_edits() {
        let mut track = multi_source_track();
        track.split_clip_at_timeline(3000).unwrap();
        track.trim_clip_edge(2, ClipEdge::Left, 500).unwrap();
        track.remove_clip(1).unwrap();

        let offsets = track.offsets();
        assert!(offsets.windows(2).all(|p| p[0] <= p[1]));
        let total: TimeMs = (0..track.len()).map(|i| track.clip_output_duration(i)).sum();
        assert_eq!(*offsets.last().unwrap(), total);
    }

    #[test]
    fn test_serde_rebuilds_offsets() {
        let track = multi_source_track();
        let json = serde_json::to_string(&track).unwrap();
        let parsed: VideoClipTrack = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.offsets(), track.offsets());
        assert_eq!(parsed, track);
    }

    #[test]
    fn test_is_full_video() {
        let track = VideoClipTrack::from_full_video(10_000);
        assert!(track.is_full_video(10_000));
        assert!(!track.is_full_video(12_000));
        assert!(!multi_source_track().is_full_video(10_000));
    }
}
