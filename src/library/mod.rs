//! Media Library & Template Store
//!
//! Persistent registry of user-imported media and overlay templates.
//! Both are plain CRUD stores off the playback-critical path, persisted
//! as JSON indexes under the data directory:
//!
//! ```text
//! <data_dir>/media_library/index.json
//! <data_dir>/media_library/thumbs/<id>.jpg
//! <data_dir>/templates/index.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::process::ProcessRunner;
use crate::time::TimeMs;
use crate::workers::frame_cache::extract_frame_at;

// =============================================================================
// Media Items
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    /// Guesses the kind from a file extension.
    pub fn from_path(path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "bmp" | "gif" => MediaKind::Image,
            "mp3" | "wav" | "m4a" | "ogg" | "flac" => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }
}

/// A media file registered in the library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub kind: MediaKind,
    /// ISO 8601 import timestamp.
    pub added_at: String,
    #[serde(default)]
    pub thumbnail_path: String,
    #[serde(default)]
    pub duration_ms: TimeMs,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub favorite: bool,
}

// =============================================================================
// Media Library
// =============================================================================

#[derive(Serialize, Deserialize, Default)]
struct MediaIndex {
    items: Vec<MediaItem>,
}

/// Persistent index of imported media with probed metadata and
/// thumbnails.
pub struct MediaLibrary {
    root: PathBuf,
    items: Vec<MediaItem>,
}

impl MediaLibrary {
    /// Opens (or initializes) the library under `<data_dir>/media_library`.
    pub fn open(data_dir: &Path) -> CoreResult<Self> {
        let root = data_dir.join("media_library");
        fs::create_dir_all(root.join("thumbs"))?;

        let index_path = root.join("index.json");
        let items = if index_path.exists() {
            let text = fs::read_to_string(&index_path)?;
            serde_json::from_str::<MediaIndex>(&text)
                .map_err(|e| CoreError::MalformedJson(e.to_string()))?
                .items
        } else {
            Vec::new()
        };

        Ok(Self { root, items })
    }

    fn persist(&self) -> CoreResult<()> {
        let index_path = self.root.join("index.json");
        let tmp = self.root.join("index.json.tmp");
        let text = serde_json::to_string_pretty(&MediaIndex {
            items: self.items.clone(),
        })
        .map_err(|e| CoreError::SchemaViolation(e.to_string()))?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, index_path)?;
        Ok(())
    }

    pub fn thumbs_dir(&self) -> PathBuf {
        self.root.join("thumbs")
    }

    /// Imports a media file: probes metadata once, renders a thumbnail,
    /// and registers the item. Returns the stored item.
    pub async fn import(&mut self, runner: &ProcessRunner, path: &Path) -> CoreResult<MediaItem> {
        if !path.is_file() {
            return Err(CoreError::ReferencedFileMissing(
                path.display().to_string(),
            ));
        }

        let kind = MediaKind::from_path(path);
        let id = ulid::Ulid::new().to_string().to_lowercase();
        let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let (duration_ms, width, height) = match runner.probe(path).await {
            Ok(info) => (info.duration_ms, info.width, info.height),
            Err(e) => {
                tracing::warn!("probe failed for {}: {}", path.display(), e);
                (0, 0, 0)
            }
        };

        let thumbnail_path = self.thumbs_dir().join(format!("{}.jpg", id));
        let thumbnail = match kind {
            MediaKind::Video => {
                let at_ms = if duration_ms > 10_000 { 1000 } else { duration_ms / 10 };
                match extract_frame_at(runner, &path.to_string_lossy(), at_ms, &thumbnail_path)
                    .await
                {
                    Ok(()) => thumbnail_path.to_string_lossy().to_string(),
                    Err(e) => {
                        tracing::warn!("thumbnail failed for {}: {}", path.display(), e);
                        String::new()
                    }
                }
            }
            MediaKind::Image => {
                // Scale the image itself down for the picker.
                let args: Vec<String> = vec![
                    "-hide_banner".to_string(),
                    "-loglevel".to_string(),
                    "error".to_string(),
                    "-i".to_string(),
                    path.to_string_lossy().to_string(),
                    "-vf".to_string(),
                    "scale=320:-1".to_string(),
                    "-frames:v".to_string(),
                    "1".to_string(),
                    "-y".to_string(),
                    thumbnail_path.to_string_lossy().to_string(),
                ];
                match runner.run_ffmpeg(&args).await {
                    Ok(_) => thumbnail_path.to_string_lossy().to_string(),
                    Err(_) => String::new(),
                }
            }
            MediaKind::Audio => String::new(),
        };

        let item = MediaItem {
            id,
            file_path: path.to_string_lossy().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            kind,
            added_at: chrono::Utc::now().to_rfc3339(),
            thumbnail_path: thumbnail,
            duration_ms,
            width,
            height,
            file_size,
            favorite: false,
        };

        self.items.push(item.clone());
        self.persist()?;
        info!("imported {} into media library", path.display());
        Ok(item)
    }

    /// Registers a pre-built item (tests, migrations).
    pub fn add(&mut self, item: MediaItem) -> CoreResult<()> {
        self.items.push(item);
        self.persist()
    }

    /// Removes an item and its thumbnail.
    pub fn remove(&mut self, id: &str) -> CoreResult<MediaItem> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(CoreError::NotFound(0))?;
        let item = self.items.remove(pos);
        if !item.thumbnail_path.is_empty() {
            let _ = fs::remove_file(&item.thumbnail_path);
        }
        self.persist()?;
        Ok(item)
    }

    /// Removes everything, thumbnails included.
    pub fn clear(&mut self) -> CoreResult<()> {
        for item in &self.items {
            if !item.thumbnail_path.is_empty() {
                let _ = fs::remove_file(&item.thumbnail_path);
            }
        }
        self.items.clear();
        self.persist()
    }

    pub fn list(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn mark_favorite(&mut self, id: &str, favorite: bool) -> CoreResult<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(CoreError::NotFound(0))?;
        item.favorite = favorite;
        self.persist()
    }
}

// =============================================================================
// Overlay Templates
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Frame,
    Watermark,
    LowerThird,
}

/// A reusable overlay template (transparent PNG plus default placement).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayTemplate {
    pub id: String,
    pub name: String,
    pub image_path: String,
    #[serde(default)]
    pub thumbnail_path: String,
    pub category: TemplateCategory,
    #[serde(default = "default_template_x")]
    pub x_percent: f32,
    #[serde(default = "default_template_y")]
    pub y_percent: f32,
    #[serde(default = "default_template_scale")]
    pub scale_percent: f32,
    #[serde(default = "default_template_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub builtin: bool,
}

fn default_template_x() -> f32 {
    0.0
}

fn default_template_y() -> f32 {
    0.0
}

fn default_template_scale() -> f32 {
    100.0
}

fn default_template_opacity() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Default)]
struct TemplateIndex {
    templates: Vec<OverlayTemplate>,
}

/// Persistent store of overlay templates.
pub struct TemplateStore {
    index_path: PathBuf,
    templates: Vec<OverlayTemplate>,
}

impl TemplateStore {
    pub fn open(data_dir: &Path) -> CoreResult<Self> {
        let root = data_dir.join("templates");
        fs::create_dir_all(&root)?;
        let index_path = root.join("index.json");

        let templates = if index_path.exists() {
            let text = fs::read_to_string(&index_path)?;
            serde_json::from_str::<TemplateIndex>(&text)
                .map_err(|e| CoreError::MalformedJson(e.to_string()))?
                .templates
        } else {
            Vec::new()
        };

        Ok(Self {
            index_path,
            templates,
        })
    }

    fn persist(&self) -> CoreResult<()> {
        let tmp = self.index_path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(&TemplateIndex {
            templates: self.templates.clone(),
        })
        .map_err(|e| CoreError::SchemaViolation(e.to_string()))?;
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }

    pub fn add(&mut self, mut template: OverlayTemplate) -> CoreResult<String> {
        if template.id.is_empty() {
            template.id = ulid::Ulid::new().to_string().to_lowercase();
        }
        let id = template.id.clone();
        self.templates.push(template);
        self.persist()?;
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> CoreResult<OverlayTemplate> {
        let pos = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::NotFound(0))?;
        let template = self.templates.remove(pos);
        self.persist()?;
        Ok(template)
    }

    pub fn list(&self) -> &[OverlayTemplate] {
        &self.templates
    }

    pub fn by_category(&self, category: TemplateCategory) -> Vec<&OverlayTemplate> {
        self.templates
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(id: &str, name: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            file_path: format!("/media/{}", name),
            file_name: name.to_string(),
            kind: MediaKind::Video,
            added_at: "2025-01-01T00:00:00Z".to_string(),
            thumbnail_path: String::new(),
            duration_ms: 10_000,
            width: 1920,
            height: 1080,
            file_size: 1024,
            favorite: false,
        }
    }

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a.PNG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("a.mp3")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("a.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Video);
    }

    #[test]
    fn test_library_crud_persists() {
        let dir = TempDir::new().unwrap();

        let mut library = MediaLibrary::open(dir.path()).unwrap();
        library.add(item("id1", "a.mp4")).unwrap();
        library.add(item("id2", "b.mp4")).unwrap();
        library.mark_favorite("id2", true).unwrap();

        // Reopen from disk
        let library = MediaLibrary::open(dir.path()).unwrap();
        assert_eq!(library.list().len(), 2);
        assert!(library.get("id2").unwrap().favorite);
        assert!(!library.get("id1").unwrap().favorite);
    }

    #[test]
    fn test_library_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let mut library = MediaLibrary::open(dir.path()).unwrap();
        library.add(item("id1", "a.mp4")).unwrap();
        library.add(item("id2", "b.mp4")).unwrap();

        let removed = library.remove("id1").unwrap();
        assert_eq!(removed.file_name, "a.mp4");
        assert_eq!(library.list().len(), 1);
        assert!(library.remove("id1").is_err());

        library.clear().unwrap();
        assert!(library.list().is_empty());

        let library = MediaLibrary::open(dir.path()).unwrap();
        assert!(library.list().is_empty());
    }

    #[test]
    fn test_mark_favorite_unknown_id() {
        let dir = TempDir::new().unwrap();
        let mut library = MediaLibrary::open(dir.path()).unwrap();
        assert!(library.mark_favorite("ghost", true).is_err());
    }

    #[test]
    fn test_template_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = TemplateStore::open(dir.path()).unwrap();

        let id = store
            .add(OverlayTemplate {
                id: String::new(),
                name: "Corner watermark".to_string(),
                image_path: "/assets/wm.png".to_string(),
                thumbnail_path: String::new(),
                category: TemplateCategory::Watermark,
                x_percent: 80.0,
                y_percent: 5.0,
                scale_percent: 15.0,
                opacity: 0.8,
                builtin: true,
            })
            .unwrap();
        assert!(!id.is_empty());

        let store = TemplateStore::open(dir.path()).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.by_category(TemplateCategory::Watermark).len(), 1);
        assert!(store.by_category(TemplateCategory::Frame).is_empty());
        assert_eq!(store.list()[0].scale_percent, 15.0);
    }

    #[test]
    fn test_template_remove() {
        let dir = TempDir::new().unwrap();
        let mut store = TemplateStore::open(dir.path()).unwrap();
        let id = store
            .add(OverlayTemplate {
                id: String::new(),
                name: "Frame".to_string(),
                image_path: "/assets/frame.png".to_string(),
                thumbnail_path: String::new(),
                category: TemplateCategory::Frame,
                x_percent: 0.0,
                y_percent: 0.0,
                scale_percent: 100.0,
                opacity: 1.0,
                builtin: false,
            })
            .unwrap();

        store.remove(&id).unwrap();
        assert!(store.list().is_empty());
        assert!(store.remove(&id).is_err());
    }
}
