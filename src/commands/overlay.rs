//! Overlay Edit Commands
//!
//! Commands over the image (PIP) and text overlay tracks.

use crate::commands::EditCommand;
use crate::error::{CoreError, CoreResult};
use crate::model::{ImageOverlay, ProjectState, TextOverlay};

fn check_image_track(project: &ProjectState) -> CoreResult<()> {
    if project.image_overlay_track.locked {
        return Err(CoreError::TrackLocked);
    }
    Ok(())
}

fn check_text_track(project: &ProjectState) -> CoreResult<()> {
    if project.text_overlay_track.locked {
        return Err(CoreError::TrackLocked);
    }
    Ok(())
}

// =============================================================================
// Image Overlays
// =============================================================================

#[derive(Debug)]
pub struct AddImageOverlayCommand {
    overlay: ImageOverlay,
    inserted_at: Option<usize>,
}

impl AddImageOverlayCommand {
    pub fn new(overlay: ImageOverlay) -> Self {
        Self {
            overlay,
            inserted_at: None,
        }
    }
}

impl EditCommand for AddImageOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_image_track(project)?;
        self.inserted_at = Some(project.image_overlay_track.add_overlay(self.overlay.clone())?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let index = self.inserted_at.take().ok_or(CoreError::NothingToUndo)?;
        check_image_track(project)?;
        project.image_overlay_track.remove_overlay(index)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Add image overlay"
    }
}

/// Moves/resizes an image overlay. Reordering by start time is handled by
/// the track, so revert snapshots the overlay list.
#[derive(Debug)]
pub struct MoveImageOverlayCommand {
    index: usize,
    updated: ImageOverlay,
    saved: Option<Vec<ImageOverlay>>,
}

impl MoveImageOverlayCommand {
    pub fn new(index: usize, updated: ImageOverlay) -> Self {
        Self {
            index,
            updated,
            saved: None,
        }
    }
}

impl EditCommand for MoveImageOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_image_track(project)?;
        let snapshot = project.image_overlay_track.overlays.clone();
        project
            .image_overlay_track
            .update_overlay(self.index, self.updated.clone())?;
        self.saved = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        check_image_track(project)?;
        project.image_overlay_track.overlays = saved;
        Ok(())
    }

    fn label(&self) -> &str {
        "Move image overlay"
    }
}

#[derive(Debug)]
pub struct RemoveImageOverlayCommand {
    index: usize,
    removed: Option<ImageOverlay>,
}

impl RemoveImageOverlayCommand {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            removed: None,
        }
    }
}

impl EditCommand for RemoveImageOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_image_track(project)?;
        self.removed = Some(project.image_overlay_track.remove_overlay(self.index)?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let removed = self.removed.take().ok_or(CoreError::NothingToUndo)?;
        check_image_track(project)?;
        project
            .image_overlay_track
            .overlays
            .insert(self.index, removed);
        Ok(())
    }

    fn label(&self) -> &str {
        "Remove image overlay"
    }
}

// =============================================================================
// Text Overlays
// =============================================================================

#[derive(Debug)]
pub struct AddTextOverlayCommand {
    overlay: TextOverlay,
    inserted_at: Option<usize>,
}

impl AddTextOverlayCommand {
    pub fn new(overlay: TextOverlay) -> Self {
        Self {
            overlay,
            inserted_at: None,
        }
    }
}

impl EditCommand for AddTextOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_text_track(project)?;
        self.inserted_at = Some(project.text_overlay_track.add_overlay(self.overlay.clone())?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let index = self.inserted_at.take().ok_or(CoreError::NothingToUndo)?;
        check_text_track(project)?;
        project.text_overlay_track.remove_overlay(index)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Add text overlay"
    }
}

#[derive(Debug)]
pub struct EditTextOverlayCommand {
    index: usize,
    updated: TextOverlay,
    saved: Option<Vec<TextOverlay>>,
}

impl EditTextOverlayCommand {
    pub fn new(index: usize, updated: TextOverlay) -> Self {
        Self {
            index,
            updated,
            saved: None,
        }
    }
}

impl EditCommand for EditTextOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_text_track(project)?;
        let snapshot = project.text_overlay_track.overlays.clone();
        project
            .text_overlay_track
            .update_overlay(self.index, self.updated.clone())?;
        self.saved = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let saved = self.saved.take().ok_or(CoreError::NothingToUndo)?;
        check_text_track(project)?;
        project.text_overlay_track.overlays = saved;
        Ok(())
    }

    fn label(&self) -> &str {
        "Edit text overlay"
    }
}

#[derive(Debug)]
pub struct RemoveTextOverlayCommand {
    index: usize,
    removed: Option<TextOverlay>,
}

impl RemoveTextOverlayCommand {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            removed: None,
        }
    }
}

impl EditCommand for RemoveTextOverlayCommand {
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        check_text_track(project)?;
        self.removed = Some(project.text_overlay_track.remove_overlay(self.index)?);
        Ok(())
    }

    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let removed = self.removed.take().ok_or(CoreError::NothingToUndo)?;
        check_text_track(project)?;
        project
            .text_overlay_track
            .overlays
            .insert(self.index, removed);
        Ok(())
    }

    fn label(&self) -> &str {
        "Remove text overlay"
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
        project.duration_ms = 30_000;
        project
            .image_overlay_track
            .add_overlay(ImageOverlay::new(1000, 3000, "logo.png"))
            .unwrap();
        project
            .text_overlay_track
            .add_overlay(TextOverlay::new(0, 2000, "Title"))
            .unwrap();
        project
    }

    fn assert_undo_restores(mut command: Box<dyn EditCommand>, mut project: ProjectState) {
        let before = serde_json::to_string(&project).unwrap();
        command.apply(&mut project).unwrap();
        command.revert(&mut project).unwrap();
        assert_eq!(serde_json::to_string(&project).unwrap(), before);
    }

    #[test]
    fn test_overlay_commands_revert_byte_identical() {
        assert_undo_restores(
            Box::new(AddImageOverlayCommand::new(ImageOverlay::new(
                500, 900, "b.png",
            ))),
            project(),
        );
        let mut moved = ImageOverlay::new(5000, 8000, "logo.png");
        moved.x_percent = 10.0;
        assert_undo_restores(Box::new(MoveImageOverlayCommand::new(0, moved)), project());
        assert_undo_restores(Box::new(RemoveImageOverlayCommand::new(0)), project());
        assert_undo_restores(
            Box::new(AddTextOverlayCommand::new(TextOverlay::new(
                4000, 6000, "Later",
            ))),
            project(),
        );
        assert_undo_restores(
            Box::new(EditTextOverlayCommand::new(
                0,
                TextOverlay::new(100, 2100, "Renamed"),
            )),
            project(),
        );
        assert_undo_restores(Box::new(RemoveTextOverlayCommand::new(0)), project());
    }

    #[test]
    fn test_locked_overlay_track_rejected() {
        let mut project = project();
        project.image_overlay_track.locked = true;
        let mut history = History::default();
        let result = history.execute(
            &mut project,
            Box::new(RemoveImageOverlayCommand::new(0)),
        );
        assert!(matches!(result, Err(CoreError::TrackLocked)));
        assert_eq!(project.image_overlay_track.len(), 1);
    }

    #[test]
    fn test_move_overlay_resort_then_undo() {
        let mut project = project();
        project
            .image_overlay_track
            .add_overlay(ImageOverlay::new(10_000, 12_000, "second.png"))
            .unwrap();
        let mut history = History::default();

        let mut moved = project.image_overlay_track.overlays[0].clone();
        moved.start_ms = 20_000;
        moved.end_ms = 22_000;
        history
            .execute(&mut project, Box::new(MoveImageOverlayCommand::new(0, moved)))
            .unwrap();
        assert_eq!(
            project.image_overlay_track.overlays[0].image_path,
            "second.png"
        );

        history.undo(&mut project).unwrap();
        assert_eq!(project.image_overlay_track.overlays[0].image_path, "logo.png");
    }
}
