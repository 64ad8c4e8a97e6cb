//! Editor Session
//!
//! The host-facing facade: one project, its undo history, and the
//! timeline engine, mutated exclusively on the owning thread. Workers
//! and the exporter are constructed separately and hand results back as
//! commands through [`EditorSession::apply`].

use std::path::Path;

use crate::commands::{EditCommand, History};
use crate::error::CoreResult;
use crate::model::ProjectState;
use crate::persistence::{load_project, save_project, LoadWarning};
use crate::time::TimeMs;
use crate::timeline::{TimelineEngine, TimelineTick};

/// A project open for editing.
pub struct EditorSession {
    project: ProjectState,
    history: History,
    timeline: TimelineEngine,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// Starts a session with an empty project.
    pub fn new() -> Self {
        Self {
            project: ProjectState::new(),
            history: History::default(),
            timeline: TimelineEngine::new(),
        }
    }

    /// Opens a project file; load warnings are returned for the host to
    /// surface.
    pub fn load(path: &Path) -> CoreResult<(Self, Vec<LoadWarning>)> {
        let loaded = load_project(path)?;
        Ok((
            Self {
                project: loaded.project,
                history: History::default(),
                timeline: TimelineEngine::new(),
            },
            loaded.warnings,
        ))
    }

    /// Saves the project and resets the unsaved-edit counter.
    pub fn save(&mut self, path: &Path) -> CoreResult<()> {
        save_project(&self.project, path)?;
        self.history.mark_saved();
        Ok(())
    }

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    /// Applies an edit command, recording it for undo.
    pub fn apply(&mut self, command: Box<dyn EditCommand>) -> CoreResult<()> {
        self.history.execute(&mut self.project, command)
    }

    pub fn undo(&mut self) -> CoreResult<()> {
        self.history.undo(&mut self.project)
    }

    pub fn redo(&mut self) -> CoreResult<()> {
        self.history.redo(&mut self.project)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ------------------------------------------------------------------
    // Playback position
    // ------------------------------------------------------------------

    pub fn seek(&mut self, t: TimeMs) -> TimeMs {
        self.timeline.seek(&self.project, t)
    }

    pub fn advance(&mut self, delta_ms: TimeMs) -> TimelineTick {
        self.timeline.advance(&self.project, delta_ms)
    }

    pub fn position_ms(&self) -> TimeMs {
        self.timeline.position_ms()
    }

    pub fn timeline(&self) -> &TimelineEngine {
        &self.timeline
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddSegmentCommand, EditTextCommand};
    use crate::model::SubtitleSegment;
    use tempfile::TempDir;

    #[test]
    fn test_session_edit_save_load_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.fmm.json");

        let mut session = EditorSession::new();
        session
            .apply(Box::new(AddSegmentCommand::new(
                0,
                SubtitleSegment::new(0, 1000, "hi"),
            )))
            .unwrap();
        session.save(&path).unwrap();
        assert_eq!(session.history().edits_since_mark(), 0);

        let (loaded, warnings) = EditorSession::load(&path).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.project().subtitle_tracks[0].segments.len(), 1);
    }

    #[test]
    fn test_session_undo_redo() {
        let mut session = EditorSession::new();
        session
            .apply(Box::new(AddSegmentCommand::new(
                0,
                SubtitleSegment::new(0, 1000, "hi"),
            )))
            .unwrap();
        session
            .apply(Box::new(EditTextCommand::new(0, 0, "edited")))
            .unwrap();

        session.undo().unwrap();
        assert_eq!(session.project().subtitle_tracks[0].segments[0].text, "hi");
        session.redo().unwrap();
        assert_eq!(
            session.project().subtitle_tracks[0].segments[0].text,
            "edited"
        );
    }

    #[test]
    fn test_session_playback_queries() {
        let mut session = EditorSession::new();
        assert_eq!(session.seek(500), 0); // empty project clamps to zero
        assert_eq!(session.position_ms(), 0);
    }
}
