//! Project Data Model
//!
//! In-memory model for an editing session: subtitle tracks, styles, video
//! clips, overlays, and the project aggregate. Mutators assume
//! single-threaded access; the command layer wraps them with undo records.

pub mod clip;
pub mod overlay;
pub mod project;
pub mod style;
pub mod subtitle;

pub use clip::{
    ClipEdge, ClipFilters, Transition, TransitionKind, VideoClip, VideoClipTrack, MIN_CLIP_MS,
};
pub use overlay::{
    ImageOverlay, ImageOverlayTrack, TextAlignment, TextOverlay, TextOverlayTrack, TextVAlignment,
};
pub use project::{BgmTrack, ProjectState};
pub use style::{StylePosition, SubtitleStyle};
pub use subtitle::{SubtitleSegment, SubtitleTrack, MERGE_GAP_MS};
