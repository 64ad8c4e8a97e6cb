//! Autosave & Recovery
//!
//! Idle-triggered project snapshots, a crash-recovery scan, and the
//! recent-files list. The host owns the timer: it calls
//! [`AutosaveManager::tick`] on its cadence (default every 30 s) and the
//! manager decides whether a write is due.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::model::ProjectState;
use crate::persistence::{load_project, save_project, LoadedProject};
use crate::time::TimeMs;

/// Suggested host timer cadence.
pub const AUTOSAVE_INTERVAL_MS: TimeMs = 30_000;

/// Quiescence required after the last edit before a snapshot is written.
pub const AUTOSAVE_IDLE_MS: TimeMs = 5_000;

/// Maximum entries in the recent-files list.
pub const MAX_RECENT_FILES: usize = 10;

// =============================================================================
// Recovery
// =============================================================================

/// An autosave snapshot left behind by a session that did not close
/// cleanly.
#[derive(Clone, Debug, PartialEq)]
pub struct RecoveryCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

// =============================================================================
// Manager
// =============================================================================

/// Drives autosave snapshots and the recent-file list under a data
/// directory:
///
/// ```text
/// <data_dir>/autosave/<timestamp>.fmm.json
/// <data_dir>/recent_files.json
/// ```
pub struct AutosaveManager {
    data_dir: PathBuf,
    idle_ms: TimeMs,
    last_edit_at: Option<TimeMs>,
    dirty: bool,
}

impl AutosaveManager {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            idle_ms: AUTOSAVE_IDLE_MS,
            last_edit_at: None,
            dirty: false,
        }
    }

    pub fn with_idle_ms(mut self, idle_ms: TimeMs) -> Self {
        self.idle_ms = idle_ms;
        self
    }

    fn autosave_dir(&self) -> PathBuf {
        self.data_dir.join("autosave")
    }

    /// Called by the host whenever an edit command applied. `now_ms` is
    /// wallclock unix milliseconds.
    pub fn notify_edit(&mut self, now_ms: TimeMs) {
        self.dirty = true;
        self.last_edit_at = Some(now_ms);
    }

    /// Timer tick. Writes exactly one snapshot when there are unsaved
    /// edits and at least the idle window has passed since the last one;
    /// otherwise performs zero file writes.
    pub fn tick(&mut self, project: &ProjectState, now_ms: TimeMs) -> CoreResult<Option<PathBuf>> {
        if !self.dirty {
            return Ok(None);
        }
        let quiescent = self
            .last_edit_at
            .map(|at| now_ms - at >= self.idle_ms)
            .unwrap_or(true);
        if !quiescent {
            return Ok(None);
        }

        let dir = self.autosave_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("autosave_{}.fmm.json", now_ms / 1000));
        save_project(project, &path)?;
        self.dirty = false;
        info!("autosaved project to {}", path.display());
        Ok(Some(path))
    }

    /// Whether an edit is pending a snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Startup scan for snapshots a previous session left behind,
    /// newest first. An empty result means the last session closed
    /// cleanly.
    pub fn scan_recovery(&self) -> CoreResult<Vec<RecoveryCandidate>> {
        let dir = self.autosave_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".fmm.json"))
            {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                candidates.push(RecoveryCandidate { path, modified });
            }
        }
        candidates.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(candidates)
    }

    /// Loads a recovery candidate through the normal persistence path.
    pub fn recover(&self, candidate: &RecoveryCandidate) -> CoreResult<LoadedProject> {
        load_project(&candidate.path)
    }

    /// Removes all autosave snapshots (clean shutdown, or the user
    /// discarded recovery).
    pub fn discard_recovery(&self) -> CoreResult<()> {
        for candidate in self.scan_recovery()? {
            if let Err(e) = fs::remove_file(&candidate.path) {
                warn!(
                    "could not remove autosave {}: {}",
                    candidate.path.display(),
                    e
                );
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recent files
    // ------------------------------------------------------------------

    fn recent_path(&self) -> PathBuf {
        self.data_dir.join("recent_files.json")
    }

    /// MRU list of project files, deduplicated by absolute path, capped
    /// at [`MAX_RECENT_FILES`]. Entries whose file vanished are dropped
    /// on read.
    pub fn recent_files(&self) -> Vec<PathBuf> {
        let Ok(text) = fs::read_to_string(self.recent_path()) else {
            return Vec::new();
        };
        let Ok(list) = serde_json::from_str::<RecentFiles>(&text) else {
            return Vec::new();
        };
        list.files
            .into_iter()
            .filter(|p| p.is_file())
            .collect()
    }

    /// Promotes `path` to the front of the recent list.
    pub fn add_recent_file(&self, path: &Path) -> CoreResult<()> {
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let mut files = self.recent_files();
        files.retain(|p| p != &absolute);
        files.insert(0, absolute);
        files.truncate(MAX_RECENT_FILES);

        fs::create_dir_all(&self.data_dir)?;
        let text = serde_json::to_string_pretty(&RecentFiles { files })
            .unwrap_or_else(|_| "{\"files\":[]}".to_string());
        fs::write(self.recent_path(), text)?;
        Ok(())
    }

    pub fn clear_recent_files(&self) -> CoreResult<()> {
        let path = self.recent_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Default)]
struct RecentFiles {
    files: Vec<PathBuf>,
}

/// Default data directory: `<platform data dir>/fastmoviemaker`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fastmoviemaker")
}

// =============================================================================
// Tests
// =============================================================================
