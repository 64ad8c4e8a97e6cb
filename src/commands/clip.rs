//! Clip Edit Commands
//!
//! Commands over the video clip track. Structural clip edits rebuild the
//! prefix sums and may drop invalidated transitions, so each command
//! snapshots the whole track for an exact revert.

use crate::commands::EditCommand;
use crate::error::{CoreError, CoreResult};
use crate::model::{ClipEdge, ClipFilters, ProjectState, Transition, VideoClip, VideoClipTrack};
use crate::time::TimeMs;

fn clip_track_mut(project: &mut ProjectState) -> CoreResult<&mut VideoClipTrack> {
    let track = project
        .video_clip_track
        .as_mut()
        .ok_or_else(|| CoreError::OutOfRange("project has no clip track".to_string()))?;
    if track.locked {
        return Err(CoreError::TrackLocked);
    }
    Ok(track)
}

fn snapshot(project: &ProjectState) -> Option<VideoClipTrack> {
    project.video_clip_track.clone()
}

fn restore(project: &mut ProjectState, saved: Option<VideoClipTrack>) {
    project.video_clip_track = saved;
}

// =============================================================================
// AddClip / DeleteClip
// =============================================================================

#[derive(Debug)]
pub struct AddClipCommand {
    clip: VideoClip,
    saved: Option<Option<VideoClipTrack>>,
}

impl AddClipCommand {
    pub fn new(clip: VideoClip) -> Self {
        Self { clip, saved: None }
    }
}

impl EditCommand for AddClipCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let before = snapshot(project);
        clip_track_mut(project)?.add_clip(self.clip.clone())?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Add clip"
    }
}

#[derive(Debug)]
pub struct DeleteClipCommand {
    index: usize,
    saved: Option<Option<VideoClipTrack>>,
}

impl DeleteClipCommand {
    pub fn new(index: usize) -> Self {
        Self { index, saved: None }
    }
}

impl EditCommand for DeleteClipCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let before = snapshot(project);
        clip_track_mut(project)?.remove_clip(self.index)?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Delete clip"
    }
}

// =============================================================================
// SplitClip / TrimClip
// =============================================================================

#[derive(Debug)]
pub struct SplitClipCommand {
    at_timeline_ms: TimeMs,
    saved: Option<Option<VideoClipTrack>>,
}

impl SplitClipCommand {
    pub fn new(at_timeline_ms: TimeMs) -> Self {
        Self {
            at_timeline_ms,
            saved: None,
        }
    }
}

impl EditCommand for SplitClipCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let before = snapshot(project);
        clip_track_mut(project)?.split_clip_at_timeline(self.at_timeline_ms)?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Split clip"
    }
}

#[derive(Debug)]
pub struct TrimClipCommand {
    index: usize,
    edge: ClipEdge,
    delta_ms: TimeMs,
    saved: Option<Option<VideoClipTrack>>,
}

impl TrimClipCommand {
    pub fn new(index: usize, edge: ClipEdge, delta_ms: TimeMs) -> Self {
        Self {
            index,
            edge,
            delta_ms,
            saved: None,
        }
    }
}

impl EditCommand for TrimClipCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let before = snapshot(project);
        clip_track_mut(project)?.trim_clip_edge(self.index, self.edge, self.delta_ms)?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Trim clip"
    }
}

// =============================================================================
// SetTransition / EditFilter
// =============================================================================

#[derive(Debug)]
pub struct SetTransitionCommand {
    index: usize,
    transition: Option<Transition>,
    saved: Option<Option<VideoClipTrack>>,
}

impl SetTransitionCommand {
    /// `None` clears the outgoing transition on the clip.
    pub fn new(index: usize, transition: Option<Transition>) -> Self {
        Self {
            index,
            transition,
            saved: None,
        }
    }
}

impl EditCommand for SetTransitionCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let before = snapshot(project);
        clip_track_mut(project)?.set_transition(self.index, self.transition)?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Set transition"
    }
}

#[derive(Debug)]
pub struct EditFilterCommand {
    index: usize,
    filters: ClipFilters,
    saved: Option<Option<VideoClipTrack>>,
}

impl EditFilterCommand {
    pub fn new(index: usize, filters: ClipFilters) -> Self {
        Self {
            index,
            filters,
            saved: None,
        }
    }
}

impl EditCommand for EditFilterCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        if let Some(b) = self.filters.brightness {
            if !(-1.0..=1.0).contains(&b) {
                return Err(CoreError::OutOfRange(format!("brightness {}", b)));
            }
        }
        if let Some(c) = self.filters.contrast {
            if !(0.0..=2.0).contains(&c) {
                return Err(CoreError::OutOfRange(format!("contrast {}", c)));
            }
        }
        if let Some(s) = self.filters.saturation {
            if !(0.0..=3.0).contains(&s) {
                return Err(CoreError::OutOfRange(format!("saturation {}", s)));
            }
        }
        let before = snapshot(project);
        clip_track_mut(project)?.set_filters(self.index, self.filters)?;
        self.saved = Some(before);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        restore(project, saved);
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit color filters"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::History;
    use crate::model::TransitionKind;

    fn project() -> ProjectState {
        let mut project = ProjectState::new();
        project.duration_ms = 30_000;
        project.enable_clip_editing();
        project
    }

    fn assert_undo_restores(mut command: Box<dyn EditCommand>, mut project: ProjectState) {
        let before = serde_json::to_string(&project).unwrap();
        command.apply(&mut project).unwrap();
        command.revert(&mut project).unwrap();
        assert_eq!(serde_json::to_string(&project).unwrap(), before);
    }

    #[test]
    fn test_clip_commands_revert_byte_identical() {
        assert_undo_restores(
            Box::new(AddClipCommand::new(
                VideoClip::new(0, 5000).with_source("B.mp4"),
            )),
            project(),
        );
        assert_undo_restores(Box::new(SplitClipCommand::new(10_000)), project());
        assert_undo_restores(
            Box::new(TrimClipCommand::new(0, ClipEdge::Right, -3000)),
            project(),
        );
        assert_undo_restores(
            Box::new(EditFilterCommand::new(
                0,
                ClipFilters {
                    brightness: Some(0.1),
                    contrast: None,
                    saturation: Some(1.2),
                },
            )),
            project(),
        );

        let mut split = project();
        SplitClipCommand::new(10_000).apply(&mut split).unwrap();
        assert_undo_restores(Box::new(DeleteClipCommand::new(0)), split.clone());
        assert_undo_restores(
            Box::new(SetTransitionCommand::new(
                0,
                Some(Transition {
                    kind: TransitionKind::Fade,
                    duration_ms: 1000,
                    audio_crossfade: true,
                }),
            )),
            split,
        );
    }

    #[test]
    fn test_commands_require_clip_track() {
        let mut project = ProjectState::new();
        let mut history = History::default();
        let result = history.execute(&mut project, Box::new(SplitClipCommand::new(1000)));
        assert!(result.is_err());
    }

    #[test]
    fn test_locked_clip_track_rejects_edit() {
        let mut project = project();
        project.video_clip_track.as_mut().unwrap().locked = true;
        let mut cmd = SplitClipCommand::new(10_000);
        assert!(matches!(
            cmd.apply(&mut project),
            Err(CoreError::TrackLocked)
        ));
    }

    #[test]
    fn test_filter_validation_ranges() {
        let mut project = project();
        let mut cmd = EditFilterCommand::new(
            0,
            ClipFilters {
                brightness: Some(2.0),
                contrast: None,
                saturation: None,
            },
        );
        assert!(cmd.apply(&mut project).is_err());
    }

    #[test]
    fn test_split_delete_undo_chain() {
        let mut project = project();
        let mut history = History::default();

        history
            .execute(&mut project, Box::new(SplitClipCommand::new(12_000)))
            .unwrap();
        history
            .execute(&mut project, Box::new(DeleteClipCommand::new(0)))
            .unwrap();

        let track = project.video_clip_track.as_ref().unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.output_duration_ms(), 18_000);

        history.undo(&mut project).unwrap();
        history.undo(&mut project).unwrap();
        let track = project.video_clip_track.as_ref().unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.output_duration_ms(), 30_000);
    }
}
