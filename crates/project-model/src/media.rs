//! Media assets referenced by segments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of visual source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

/// An immutable, project-owned visual asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Identifier referenced from `Segment::media_ids`.
    pub id: String,

    /// Image or video.
    #[serde(rename = "type", alias = "media_type", default)]
    pub kind: MediaKind,

    /// Source file on disk.
    #[serde(alias = "file_path")]
    pub path: PathBuf,

    /// Known duration for video assets, if the producer recorded one.
    #[serde(default, alias = "durationSeconds", skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl MediaAsset {
    pub fn image(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Image,
            path: path.into(),
            duration_secs: None,
        }
    }

    pub fn video(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        duration_secs: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Video,
            path: path.into(),
            duration_secs,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Resolve a relative path against `base`, leaving absolute paths untouched.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_accepts_legacy_keys() {
        let asset: MediaAsset = serde_json::from_str(
            r#"{"id":"m1","media_type":"video","file_path":"clips/a.mp4","durationSeconds":3.5}"#,
        )
        .unwrap();
        assert_eq!(asset.kind, MediaKind::Video);
        assert_eq!(asset.path, PathBuf::from("clips/a.mp4"));
        assert_eq!(asset.duration_secs, Some(3.5));
    }

    #[test]
    fn test_kind_defaults_to_image() {
        let asset: MediaAsset = serde_json::from_str(r#"{"id":"m1","path":"a.png"}"#).unwrap();
        assert!(!asset.is_video());
    }

    #[test]
    fn test_resolved_against_keeps_absolute_paths() {
        let base = Path::new("/projects/demo");
        let rel = MediaAsset::image("a", "img/a.png").resolved_against(base);
        assert_eq!(rel.path, PathBuf::from("/projects/demo/img/a.png"));
        let abs = MediaAsset::image("b", "/srv/b.png").resolved_against(base);
        assert_eq!(abs.path, PathBuf::from("/srv/b.png"));
    }
}
