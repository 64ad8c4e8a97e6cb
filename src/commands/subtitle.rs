//! Subtitle Edit Commands
//!
//! Commands over segments of a subtitle track. Structural commands
//! (split, merge, batch shift) snapshot the segment list so revert is an
//! exact restore; scalar commands store the prior value.

use crate::commands::{unlocked_track_mut, EditCommand};
use crate::error::{CoreError, CoreResult};
use crate::model::{ProjectState, SubtitleSegment, SubtitleStyle};
use crate::time::TimeMs;

// =============================================================================
// EditText
// =============================================================================

#[derive(Debug)]
pub struct EditTextCommand {
    track: usize,
    index: usize,
    new_text: String,
    old_text: Option<String>,
}

impl EditTextCommand {
    pub fn new(track: usize, index: usize, new_text: impl Into<String>) -> Self {
        Self {
            track,
            index,
            new_text: new_text.into(),
            old_text: None,
        }
    }
}

impl EditCommand for EditTextCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        self.old_text = Some(std::mem::replace(&mut seg.text, self.new_text.clone()));
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let old = self.old_text.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        seg.text = old;
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit text"
    }
}

// =============================================================================
// EditTime
// =============================================================================

#[derive(Debug)]
pub struct EditTimeCommand {
    track: usize,
    index: usize,
    new_start_ms: TimeMs,
    new_end_ms: TimeMs,
    old_times: Option<(TimeMs, TimeMs)>,
}

impl EditTimeCommand {
    pub fn new(track: usize, index: usize, new_start_ms: TimeMs, new_end_ms: TimeMs) -> Self {
        Self {
            track,
            index,
            new_start_ms,
            new_end_ms,
            old_times: None,
        }
    }

    fn set_times(
        project: &mut ProjectState,
        track: usize,
        index: usize,
        start_ms: TimeMs,
        end_ms: TimeMs,
    ) -> CoreResult<(TimeMs, TimeMs)> {
        if start_ms < 0 || start_ms >= end_ms {
            return Err(CoreError::OutOfRange(format!(
                "segment times {}~{}ms",
                start_ms, end_ms
            )));
        }
        let track = unlocked_track_mut(project, track)?;
        let seg = track
            .segments
            .get(index)
            .ok_or(CoreError::NotFound(index))?;
        let old = (seg.start_ms, seg.end_ms);

        let prev_end = index.checked_sub(1).map(|i| track.segments[i].end_ms);
        let next_start = track.segments.get(index + 1).map(|s| s.start_ms);
        if prev_end.is_some_and(|e| e > start_ms) || next_start.is_some_and(|s| s < end_ms) {
            return Err(CoreError::Overlap { start_ms, end_ms });
        }

        let seg = &mut track.segments[index];
        seg.start_ms = start_ms;
        seg.end_ms = end_ms;
        Ok(old)
    }
}

impl EditCommand for EditTimeCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let old = Self::set_times(
            project,
            self.track,
            self.index,
            self.new_start_ms,
            self.new_end_ms,
        )?;
        self.old_times = Some(old);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let (start, end) = self.old_times.take().ok_or(CoreError::NothingToUndo)?;
        Self::set_times(project, self.track, self.index, start, end)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit timing"
    }
}

// =============================================================================
// MoveSegment
// =============================================================================

#[derive(Debug)]
pub struct MoveSegmentCommand {
    track: usize,
    index: usize,
    delta_ms: TimeMs,
    old_times: Option<(TimeMs, TimeMs)>,
}

impl MoveSegmentCommand {
    pub fn new(track: usize, index: usize, delta_ms: TimeMs) -> Self {
        Self {
            track,
            index,
            delta_ms,
            old_times: None,
        }
    }
}

impl EditCommand for MoveSegmentCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let duration = project.output_duration_ms();
        let track = unlocked_track_mut(project, self.track)?;
        let old = track
            .segments
            .get(self.index)
            .map(|s| (s.start_ms, s.end_ms))
            .ok_or(CoreError::NotFound(self.index))?;
        track.move_segment(self.index, self.delta_ms, duration)?;
        self.old_times = Some(old);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let (start, end) = self.old_times.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        seg.start_ms = start;
        seg.end_ms = end;
        Ok(())
    }

    fn label(&self) -> &str {
        "Move segment"
    }
}

// =============================================================================
// AddSegment / DeleteSegment
// =============================================================================

#[derive(Debug)]
pub struct AddSegmentCommand {
    track: usize,
    segment: SubtitleSegment,
    inserted_at: Option<usize>,
}

impl AddSegmentCommand {
    pub fn new(track: usize, segment: SubtitleSegment) -> Self {
        Self {
            track,
            segment,
            inserted_at: None,
        }
    }
}

impl EditCommand for AddSegmentCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        self.inserted_at = Some(track.add_segment(self.segment.clone())?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let index = self.inserted_at.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.remove_segment(index)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Add segment"
    }
}

#[derive(Debug)]
pub struct DeleteSegmentCommand {
    track: usize,
    index: usize,
    removed: Option<SubtitleSegment>,
}

impl DeleteSegmentCommand {
    pub fn new(track: usize, index: usize) -> Self {
        Self {
            track,
            index,
            removed: None,
        }
    }
}

impl EditCommand for DeleteSegmentCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        self.removed = Some(track.remove_segment(self.index)?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let removed = self.removed.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.segments.insert(self.index, removed);
        Ok(())
    }

    fn label(&self) -> &str {
        "Delete segment"
    }
}

// =============================================================================
// Split / Merge / BatchShift
// =============================================================================

#[derive(Debug)]
pub struct SplitCommand {
    track: usize,
    index: usize,
    at_ms: TimeMs,
    saved: Option<Vec<SubtitleSegment>>,
}

impl SplitCommand {
    pub fn new(track: usize, index: usize, at_ms: TimeMs) -> Self {
        Self {
            track,
            index,
            at_ms,
            saved: None,
        }
    }
}

impl EditCommand for SplitCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        let snapshot = track.segments.clone();
        track.split_segment(self.index, self.at_ms)?;
        self.saved = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.segments = saved;
        Ok(())
    }

    fn label(&self) -> &str {
        "Split segment"
    }
}

#[derive(Debug)]
pub struct MergeCommand {
    track: usize,
    index: usize,
    saved: Option<Vec<SubtitleSegment>>,
}

impl MergeCommand {
    /// Merges segments `index` and `index + 1`.
    pub fn new(track: usize, index: usize) -> Self {
        Self {
            track,
            index,
            saved: None,
        }
    }
}

impl EditCommand for MergeCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        let snapshot = track.segments.clone();
        track.merge_segments(self.index)?;
        self.saved = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.segments = saved;
        Ok(())
    }

    fn label(&self) -> &str {
        "Merge segments"
    }
}

#[derive(Debug)]
pub struct BatchShiftCommand {
    track: usize,
    indices: Vec<usize>,
    delta_ms: TimeMs,
    saved: Option<Vec<SubtitleSegment>>,
}

impl BatchShiftCommand {
    pub fn new(track: usize, indices: Vec<usize>, delta_ms: TimeMs) -> Self {
        Self {
            track,
            indices,
            delta_ms,
            saved: None,
        }
    }
}

impl EditCommand for BatchShiftCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let duration = project.output_duration_ms();
        let track = unlocked_track_mut(project, self.track)?;
        let snapshot = track.segments.clone();
        track.batch_shift(&self.indices, self.delta_ms, duration)?;
        self.saved = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.segments = saved;
        Ok(())
    }

    fn label(&self) -> &str {
        "Shift segments"
    }
}

// =============================================================================
// EditStyle / EditVolume
// =============================================================================

#[derive(Debug)]
pub struct EditStyleCommand {
    track: usize,
    index: usize,
    new_style: Option<SubtitleStyle>,
    old_style: Option<Option<SubtitleStyle>>,
}

impl EditStyleCommand {
    /// `None` clears the override back to the project default.
    pub fn new(track: usize, index: usize, new_style: Option<SubtitleStyle>) -> Self {
        Self {
            track,
            index,
            new_style,
            old_style: None,
        }
    }
}

impl EditCommand for EditStyleCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        self.old_style = Some(std::mem::replace(&mut seg.style, self.new_style.clone()));
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let old = self.old_style.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        seg.style = old;
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit style"
    }
}

#[derive(Debug)]
pub struct EditVolumeCommand {
    track: usize,
    index: usize,
    new_volume: f32,
    old_volume: Option<f32>,
}

impl EditVolumeCommand {
    pub fn new(track: usize, index: usize, new_volume: f32) -> Self {
        Self {
            track,
            index,
            new_volume,
            old_volume: None,
        }
    }
}

impl EditCommand for EditVolumeCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        if !(0.0..=2.0).contains(&self.new_volume) {
            return Err(CoreError::OutOfRange(format!(
                "volume {} outside [0.0, 2.0]",
                self.new_volume
            )));
        }
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        self.old_volume = Some(std::mem::replace(&mut seg.volume, self.new_volume));
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let old = self.old_volume.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        let seg = track
            .segments
            .get_mut(self.index)
            .ok_or(CoreError::NotFound(self.index))?;
        seg.volume = old;
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit volume"
    }
}

// =============================================================================
// SetTrackAudio
// =============================================================================

/// Applies a TTS synthesis result to a track: the merged audio file plus
/// its placement on the output timeline.
#[derive(Debug)]
pub struct SetTrackAudioCommand {
    track: usize,
    audio_path: Option<String>,
    audio_start_ms: TimeMs,
    audio_duration_ms: TimeMs,
    old: Option<(Option<String>, TimeMs, TimeMs)>,
}

impl SetTrackAudioCommand {
    pub fn new(
        track: usize,
        audio_path: Option<String>,
        audio_start_ms: TimeMs,
        audio_duration_ms: TimeMs,
    ) -> Self {
        Self {
            track,
            audio_path,
            audio_start_ms,
            audio_duration_ms,
            old: None,
        }
    }
}

impl EditCommand for SetTrackAudioCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let track = unlocked_track_mut(project, self.track)?;
        self.old = Some((
            track.audio_path.clone(),
            track.audio_start_ms,
            track.audio_duration_ms,
        ));
        track.audio_path = self.audio_path.clone();
        track.audio_start_ms = self.audio_start_ms;
        track.audio_duration_ms = self.audio_duration_ms;
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let (path, start, duration) = self.old.take().ok_or(CoreError::NothingToUndo)?;
        let track = unlocked_track_mut(project, self.track)?;
        track.audio_path = path;
        track.audio_start_ms = start;
        track.audio_duration_ms = duration;
        Ok(())
    }

    fn label(&self) -> &str {
        "Set track audio"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::History;

    fn project() -> ProjectState {
        let mut project = ProjectState::new();
        project.duration_ms = 60_000;
        let track = project.active_track_mut().unwrap();
        track
            .add_segment(SubtitleSegment::new(0, 1000, "one"))
            .unwrap();
        track
            .add_segment(SubtitleSegment::new(2000, 3000, "two"))
            .unwrap();
        project
    }

    fn mergeable_project() -> ProjectState {
        let mut project = ProjectState::new();
        project.duration_ms = 60_000;
        let track = project.active_track_mut().unwrap();
        track
            .add_segment(SubtitleSegment::new(0, 1000, "one"))
            .unwrap();
        track
            .add_segment(SubtitleSegment::new(1300, 3000, "two"))
            .unwrap();
        project
    }

    fn assert_undo_restores(mut command: Box<dyn EditCommand>, mut project: ProjectState) {
        let before = serde_json::to_string(&project).unwrap();
        command.apply(&mut project).unwrap();
        assert_ne!(serde_json::to_string(&project).unwrap(), before);
        command.revert(&mut project).unwrap();
        assert_eq!(serde_json::to_string(&project).unwrap(), before);
    }

    #[test]
    fn test_every_command_reverts_byte_identical() {
        assert_undo_restores(Box::new(EditTextCommand::new(0, 0, "changed")), project());
        assert_undo_restores(Box::new(EditTimeCommand::new(0, 0, 100, 1100)), project());
        assert_undo_restores(Box::new(MoveSegmentCommand::new(0, 1, 500)), project());
        assert_undo_restores(
            Box::new(AddSegmentCommand::new(
                0,
                SubtitleSegment::new(5000, 6000, "new"),
            )),
            project(),
        );
        assert_undo_restores(Box::new(DeleteSegmentCommand::new(0, 0)), project());
        assert_undo_restores(Box::new(SplitCommand::new(0, 1, 2500)), project());
        assert_undo_restores(Box::new(MergeCommand::new(0, 0)), mergeable_project());
        assert_undo_restores(
            Box::new(BatchShiftCommand::new(0, vec![0, 1], 300)),
            project(),
        );
        assert_undo_restores(
            Box::new(EditStyleCommand::new(
                0,
                0,
                Some(SubtitleStyle::new().with_font_size(40)),
            )),
            project(),
        );
        assert_undo_restores(Box::new(EditVolumeCommand::new(0, 0, 1.5)), project());
        assert_undo_restores(
            Box::new(SetTrackAudioCommand::new(
                0,
                Some("/tmp/tts.mp3".to_string()),
                0,
                9000,
            )),
            project(),
        );
    }

    #[test]
    fn test_edit_time_rejects_overlap() {
        let mut project = project();
        let mut cmd = EditTimeCommand::new(0, 0, 0, 2500);
        assert!(matches!(
            cmd.apply(&mut project),
            Err(CoreError::Overlap { .. })
        ));
        assert_eq!(project.subtitle_tracks[0].segments[0].end_ms, 1000);
    }

    #[test]
    fn test_batch_shift_is_atomic_via_history() {
        let mut project = project();
        let mut history = History::default();
        let before = serde_json::to_string(&project).unwrap();

        // Shifting both left collides with zero for the first segment
        let result = history.execute(
            &mut project,
            Box::new(BatchShiftCommand::new(0, vec![0, 1], -500)),
        );
        assert!(result.is_err());
        assert_eq!(serde_json::to_string(&project).unwrap(), before);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_volume_validation() {
        let mut project = project();
        let mut cmd = EditVolumeCommand::new(0, 0, 2.5);
        assert!(cmd.apply(&mut project).is_err());
        assert_eq!(project.subtitle_tracks[0].segments[0].volume, 1.0);
    }

    #[test]
    fn test_merge_beyond_gap_limit_fails() {
        // Segments at 0~1000 and 2000~3000 are 1000ms apart, past the
        // 500ms merge limit.
        let mut project = project();
        let mut history = History::default();
        let result = history.execute(&mut project, Box::new(MergeCommand::new(0, 0)));
        assert!(result.is_err());
        assert_eq!(project.subtitle_tracks[0].segments.len(), 2);
    }

    #[test]
    fn test_merge_then_undo_restores_two_segments() {
        let mut project = mergeable_project();
        let mut history = History::default();

        history
            .execute(&mut project, Box::new(MergeCommand::new(0, 0)))
            .unwrap();
        assert_eq!(project.subtitle_tracks[0].segments.len(), 1);
        assert_eq!(project.subtitle_tracks[0].segments[0].text, "one\ntwo");

        history.undo(&mut project).unwrap();
        assert_eq!(project.subtitle_tracks[0].segments.len(), 2);
    }
}
