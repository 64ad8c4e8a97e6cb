//! FastMovieMaker Core Engine
//!
//! The non-UI core of the FastMovieMaker subtitle editor: the project
//! model, timeline coordinate engine, background worker pipeline,
//! FFmpeg-driven export renderer, and the undo/redo edit system.
//!
//! The crate orchestrates external processes (FFmpeg, a transcription
//! engine, HTTP TTS) and guarantees a coherent, editable, persistable
//! project state. It never decodes video frames, recognizes speech, or
//! renders pixels itself.
//!
//! # Threading model
//!
//! The project state is single-writer: one main thread (or logical
//! task) owns mutation through [`commands`]. Long-running jobs run as
//! [`workers`] that emit immutable events into per-worker FIFO channels;
//! the host drains them and applies results back as commands.

pub mod autosave;
pub mod commands;
pub mod library;
pub mod model;
pub mod persistence;
pub mod process;
pub mod render;
pub mod session;
pub mod time;
pub mod timeline;
pub mod workers;

mod error;
pub use error::{CoreError, CoreResult};

pub use model::ProjectState;
pub use session::EditorSession;
