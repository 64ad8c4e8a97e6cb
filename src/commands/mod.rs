//! Edit Command System
//!
//! Every user-visible mutation is a command with `apply`/`revert` and a
//! stable label for the history UI. Commands are the only mutation
//! channel into [`ProjectState`]; workers hand their results back to the
//! main thread, which applies them here.
//!
//! Guarantees:
//! - applying either succeeds or leaves the project unchanged;
//! - `revert` restores a state whose serialization is byte-identical to
//!   the pre-apply state;
//! - composite commands are atomic.

pub mod clip;
pub mod overlay;
pub mod subtitle;

pub use clip::{
    AddClipCommand, DeleteClipCommand, EditFilterCommand, SetTransitionCommand, SplitClipCommand,
    TrimClipCommand,
};
pub use overlay::{
    AddImageOverlayCommand, AddTextOverlayCommand, EditTextOverlayCommand,
    MoveImageOverlayCommand, RemoveImageOverlayCommand, RemoveTextOverlayCommand,
};
pub use subtitle::{
    AddSegmentCommand, BatchShiftCommand, DeleteSegmentCommand, EditStyleCommand,
    EditTextCommand, EditTimeCommand, EditVolumeCommand, MergeCommand, MoveSegmentCommand,
    SetTrackAudioCommand, SplitCommand,
};

use crate::error::{CoreError, CoreResult};
use crate::model::{ProjectState, SubtitleTrack};

/// Default bound on the undo stack.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

// =============================================================================
// Command Trait
// =============================================================================

/// A reversible mutation unit recorded on the undo stack.
pub trait EditCommand: std::fmt::Debug + Send {
    /// Applies the mutation. On error the project must be unchanged.
    fn apply(&mut self, project: &mut ProjectState) -> CoreResult<()>;

    /// Reverses a previously applied mutation, restoring a state that
    /// serializes byte-identically to the pre-apply state.
    fn revert(&mut self, project: &mut ProjectState) -> CoreResult<()>;

    /// Stable description for the history UI.
    fn label(&self) -> &str;
}

/// Resolves a mutable subtitle track, rejecting locked tracks.
pub(crate) fn unlocked_track_mut(
    project: &mut ProjectState,
    track_index: usize,
) -> CoreResult<&mut SubtitleTrack> {
    let track = project
        .subtitle_tracks
        .get_mut(track_index)
        .ok_or(CoreError::NotFound(track_index))?;
    if track.locked {
        return Err(CoreError::TrackLocked);
    }
    Ok(track)
}

// =============================================================================
// History
// =============================================================================

/// Bounded undo/redo stack. Exceeding the bound evicts the oldest entry.
pub struct History {
    undo_stack: Vec<Box<dyn EditCommand>>,
    redo_stack: Vec<Box<dyn EditCommand>>,
    max_depth: usize,
    /// Commands applied since the last time the host cleared the flag
    /// (feeds the autosave quiescence rule).
    edits_since_mark: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            edits_since_mark: 0,
        }
    }

    /// Applies a command and records it. A failed apply leaves both the
    /// project and the stacks unchanged.
    pub fn execute(
        &mut self,
        project: &mut ProjectState,
        mut command: Box<dyn EditCommand>,
    ) -> CoreResult<()> {
        command.apply(project)?;
        self.redo_stack.clear();
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.edits_since_mark += 1;
        Ok(())
    }

    /// Reverts the most recent command.
    pub fn undo(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let mut command = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        match command.revert(project) {
            Ok(()) => {
                self.redo_stack.push(command);
                self.edits_since_mark += 1;
                Ok(())
            }
            Err(e) => {
                self.undo_stack.push(command);
                Err(e)
            }
        }
    }

    /// Re-applies the most recently undone command.
    pub fn redo(&mut self, project: &mut ProjectState) -> CoreResult<()> {
        let mut command = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        match command.apply(project) {
            Ok(()) => {
                self.undo_stack.push(command);
                self.edits_since_mark += 1;
                Ok(())
            }
            Err(e) => {
                self.redo_stack.push(command);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.label())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.label())
    }

    /// Commands applied/undone/redone since the last [`History::mark_saved`].
    pub fn edits_since_mark(&self) -> u64 {
        self.edits_since_mark
    }

    /// Called by the host after a successful save.
    pub fn mark_saved(&mut self) {
        self.edits_since_mark = 0;
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.edits_since_mark = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================
