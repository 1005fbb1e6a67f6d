//! Caption file selection for a render.

use std::path::{Path, PathBuf};

use reelsmith_common::error::ReelResult;
use reelsmith_project_model::segment::Segment;
use reelsmith_project_model::style::StyleConfig;
use serde::Serialize;

use crate::animator::animate;
use crate::{ass, srt};

/// On-disk caption format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    Ass,
    Srt,
}

/// A caption file ready to be burned in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionFile {
    pub path: PathBuf,
    pub format: CaptionFormat,
    pub events: usize,
}

/// Write the job's caption file into `dir`.
///
/// Returns `None` when captions are disabled or there is no text to show.
/// Dialogue mode always produces an animated ASS track.
pub fn write_caption_file(
    segments: &[Segment],
    style: &StyleConfig,
    dir: &Path,
) -> ReelResult<Option<CaptionFile>> {
    if !style.captions.enabled && !style.dialogue.enabled {
        return Ok(None);
    }

    if style.captions.animated || style.dialogue.enabled {
        let track = animate(segments, style);
        if track.is_empty() {
            return Ok(None);
        }
        let path = dir.join("captions.ass");
        ass::write_ass(&track, style, &path)?;
        return Ok(Some(CaptionFile {
            path,
            format: CaptionFormat::Ass,
            events: track.events.len(),
        }));
    }

    let cues = segments.iter().filter(|s| !s.text.trim().is_empty()).count();
    if cues == 0 {
        return Ok(None);
    }
    let path = dir.join("captions.srt");
    srt::write_srt(segments, &path)?;
    Ok(Some(CaptionFile {
        path,
        format: CaptionFormat::Srt,
        events: cues,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "reelsmith_captions_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_animated_writes_ass() {
        let dir = scratch_dir("ass");
        let file = write_caption_file(
            &[Segment::new("hi there", 0.0, 1.0)],
            &StyleConfig::default(),
            &dir,
        )
        .unwrap()
        .unwrap();
        assert_eq!(file.format, CaptionFormat::Ass);
        assert_eq!(file.events, 2);
        assert!(file.path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_static_writes_srt() {
        let dir = scratch_dir("srt");
        let mut style = StyleConfig::default();
        style.captions.animated = false;
        let file = write_caption_file(&[Segment::new("hi there", 0.0, 1.0)], &style, &dir)
            .unwrap()
            .unwrap();
        assert_eq!(file.format, CaptionFormat::Srt);
        assert_eq!(file.path.file_name().unwrap(), "captions.srt");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = scratch_dir("off");
        let mut style = StyleConfig::default();
        style.captions.enabled = false;
        let file = write_caption_file(&[Segment::new("hi", 0.0, 1.0)], &style, &dir).unwrap();
        assert!(file.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
