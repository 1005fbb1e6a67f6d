//! Render request files.
//!
//! A request file (`render.json`) bundles one job's inputs so the CLI and
//! batch runner can hand them to the engine. Relative paths inside the
//! file are resolved against the directory containing it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::job::{RenderInputs, RenderJob};
use crate::media::MediaAsset;
use crate::segment::Segment;
use crate::style::StyleConfig;

/// Current request schema version.
pub const REQUEST_VERSION: &str = "1.0";

/// On-disk render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Job id; defaults to the request file stem.
    #[serde(default)]
    pub id: String,

    /// Narration audio file.
    #[serde(alias = "audio_path")]
    pub narration_path: PathBuf,

    /// Timed segments.
    pub segments: Vec<Segment>,

    /// Asset pool.
    #[serde(default, alias = "media_assets")]
    pub media: Vec<MediaAsset>,

    /// Presentation settings.
    #[serde(default)]
    pub style: StyleConfig,

    /// Optional artifact location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

fn default_version() -> String {
    REQUEST_VERSION.to_string()
}

impl RenderRequest {
    /// Load a request from disk and resolve its relative paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RequestError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut request: RenderRequest =
            serde_json::from_str(&json).map_err(|e| RequestError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        if request.id.is_empty() {
            request.id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("render")
                .to_string();
        }

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        request = request.resolved_against(base);
        request.validate()?;
        Ok(request)
    }

    /// Save the request as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RequestError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RequestError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| RequestError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| RequestError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        if self.narration_path.is_relative() {
            self.narration_path = base.join(&self.narration_path);
        }
        self.media = self
            .media
            .into_iter()
            .map(|m| m.resolved_against(base))
            .collect();
        self.style = self.style.resolved_against(base);
        if let Some(out) = self.output_path.take() {
            self.output_path = Some(if out.is_relative() {
                base.join(out)
            } else {
                out
            });
        }
        self
    }

    /// Check structural invariants (not file existence).
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.segments.is_empty() {
            return Err(RequestError::ValidationError {
                message: "request contains no segments".to_string(),
            });
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            segment
                .validate()
                .map_err(|message| RequestError::ValidationError {
                    message: format!("segment {idx}: {message}"),
                })?;
        }
        let mut seen = std::collections::HashSet::new();
        for asset in &self.media {
            if !seen.insert(asset.id.as_str()) {
                return Err(RequestError::ValidationError {
                    message: format!("duplicate media id '{}'", asset.id),
                });
            }
        }
        Ok(())
    }

    /// Report referenced files that do not exist. Missing media is not an
    /// error at this stage; the scheduler skips those groups.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        if !self.narration_path.exists() {
            errors.push(format!(
                "Narration missing: {}",
                self.narration_path.display()
            ));
        }

        for asset in &self.media {
            if !asset.path.exists() {
                errors.push(format!(
                    "Media '{}' missing: {}",
                    asset.id,
                    asset.path.display()
                ));
            }
        }

        if let Some(music) = &self.style.music {
            if !music.path.exists() {
                errors.push(format!(
                    "Background music missing: {}",
                    music.path.display()
                ));
            }
        }

        errors
    }

    /// Turn the request into a pending render job.
    pub fn into_job(self) -> RenderJob {
        let mut job = RenderJob::new(
            self.id,
            RenderInputs {
                segments: self.segments,
                media: self.media,
                narration_path: self.narration_path,
                style: self.style,
            },
        );
        job.output_path = self.output_path;
        job
    }
}

/// Errors that can occur when loading render requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid request: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("reelsmith_request_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_resolves_relative_paths_and_defaults_id() {
        let dir = scratch_dir("load");
        let path = dir.join("episode-3.json");
        std::fs::write(
            &path,
            r#"{
                "narration_path": "audio/voice.mp3",
                "segments": [{"text": "hello there", "start": 0, "end": 2, "mediaIds": ["m1"]}],
                "media": [{"id": "m1", "type": "image", "path": "img/one.png"}],
                "style": {"aspect_ratio": "9:16", "music": {"path": "bg.mp3", "volume": 0.2}}
            }"#,
        )
        .unwrap();

        let request = RenderRequest::load(&path).unwrap();
        assert_eq!(request.id, "episode-3");
        assert_eq!(request.narration_path, dir.join("audio/voice.mp3"));
        assert_eq!(request.media[0].path, dir.join("img/one.png"));
        assert_eq!(
            request.style.music.as_ref().unwrap().path,
            dir.join("bg.mp3")
        );

        let missing = request.validate_sources();
        assert_eq!(missing.len(), 3);
        assert!(missing.iter().any(|e| e.contains("Narration missing")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_duplicate_media_ids_rejected() {
        let dir = scratch_dir("dupes");
        let path = dir.join("render.json");
        std::fs::write(
            &path,
            r#"{
                "narration_path": "voice.mp3",
                "segments": [{"text": "a", "start": 0, "end": 1}],
                "media": [{"id": "m1", "path": "a.png"}, {"id": "m1", "path": "b.png"}]
            }"#,
        )
        .unwrap();

        let err = RenderRequest::load(&path).unwrap_err();
        assert!(matches!(err, RequestError::ValidationError { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_and_reload_into_job() {
        let dir = scratch_dir("roundtrip");
        let request = RenderRequest {
            version: REQUEST_VERSION.to_string(),
            id: "job-7".to_string(),
            narration_path: dir.join("voice.mp3"),
            segments: vec![Segment::new("hi", 0.0, 1.0)],
            media: vec![],
            style: StyleConfig::default(),
            output_path: Some(dir.join("out.mp4")),
        };
        let path = dir.join("job-7.json");
        request.save(&path).unwrap();

        let job = RenderRequest::load(&path).unwrap().into_job();
        assert_eq!(job.id, "job-7");
        assert_eq!(job.output_path, Some(dir.join("out.mp4")));
        assert_eq!(job.inputs.segments.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
