//! Timed narration segments.
//!
//! Segments are produced by script generation and media reassignment
//! steps outside the engine and are consumed read-only here.

use serde::{Deserialize, Serialize};

use crate::effect::EffectKind;

/// One timed unit of narration text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SegmentRepr")]
pub struct Segment {
    /// Narration text shown as captions.
    pub text: String,

    /// Start on the output timeline (seconds).
    pub start: f64,

    /// End on the output timeline (seconds).
    pub end: f64,

    /// Explicit duration; derived as `end - start` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Speaker label used by dialogue captions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    /// Ordered media ids; the segment's duration is split evenly across them.
    pub media_ids: Vec<String>,

    /// Visual effect for the media shown during this segment.
    pub effect: EffectKind,

    /// Trailing silence after the spoken text (seconds).
    pub silence_after: f64,
}

/// Wire shape accepting both snake_case and camelCase producers, plus the
/// legacy single `mediaId` key.
#[derive(Deserialize)]
struct SegmentRepr {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default, alias = "mediaIds")]
    media_ids: Vec<String>,
    #[serde(default, alias = "mediaId")]
    media_id: Option<String>,
    #[serde(default)]
    effect: Option<EffectKind>,
    #[serde(default, alias = "silenceAfter")]
    silence_after: f64,
}

impl From<SegmentRepr> for Segment {
    fn from(repr: SegmentRepr) -> Self {
        let mut media_ids = repr.media_ids;
        if let Some(id) = repr.media_id.filter(|id| !id.is_empty()) {
            if !media_ids.contains(&id) {
                media_ids.insert(0, id);
            }
        }
        Self {
            text: repr.text,
            start: repr.start,
            end: repr.end,
            duration: repr.duration,
            speaker: repr.speaker.filter(|s| !s.trim().is_empty()),
            media_ids,
            effect: repr.effect.unwrap_or_default(),
            silence_after: repr.silence_after,
        }
    }
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            duration: None,
            speaker: None,
            media_ids: vec![],
            effect: EffectKind::None,
            silence_after: 0.0,
        }
    }

    pub fn with_media(mut self, ids: &[&str]) -> Self {
        self.media_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_silence_after(mut self, secs: f64) -> Self {
        self.silence_after = secs;
        self
    }

    /// Spoken duration in seconds (never negative).
    pub fn duration_secs(&self) -> f64 {
        self.duration.unwrap_or(self.end - self.start).max(0.0)
    }

    /// Time this segment occupies on the visual timeline, including trailing silence.
    pub fn timeline_secs(&self) -> f64 {
        self.duration_secs() + self.silence_after.max(0.0)
    }

    /// Whitespace-separated caption words.
    pub fn words(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }

    /// Check the timing invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err("segment start/end must be finite".to_string());
        }
        if self.end < self.start {
            return Err(format!(
                "segment ends before it starts ({:.3} < {:.3})",
                self.end, self.start
            ));
        }
        if self.duration.is_some_and(|d| !d.is_finite() || d < 0.0) {
            return Err("segment duration must be a non-negative number".to_string());
        }
        if !self.silence_after.is_finite() || self.silence_after < 0.0 {
            return Err("segment silence_after must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// Total visual timeline length of a segment list (spoken time plus silences).
pub fn total_timeline_secs(segments: &[Segment]) -> f64 {
    segments.iter().map(Segment::timeline_secs).sum()
}

/// Speakers in first-seen order.
pub fn speakers_in_order(segments: &[Segment]) -> Vec<String> {
    let mut speakers: Vec<String> = Vec::new();
    for speaker in segments.iter().filter_map(|s| s.speaker.as_ref()) {
        if !speakers.contains(speaker) {
            speakers.push(speaker.clone());
        }
    }
    speakers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_derived_from_bounds() {
        let seg = Segment::new("hello", 2.0, 5.5);
        assert!((seg.duration_secs() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_duration_wins() {
        let mut seg = Segment::new("hello", 2.0, 5.5);
        seg.duration = Some(4.0);
        assert!((seg.duration_secs() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_timeline_includes_silence() {
        let seg = Segment::new("hello", 0.0, 3.0).with_silence_after(1.5);
        assert!((seg.timeline_secs() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_camel_case_and_legacy_media_id() {
        let seg: Segment = serde_json::from_str(
            r#"{"text":"a b","start":0,"end":2,"mediaId":"m0","mediaIds":["m1"],"silenceAfter":0.5,"effect":"zoom_in"}"#,
        )
        .unwrap();
        assert_eq!(seg.media_ids, vec!["m0".to_string(), "m1".to_string()]);
        assert_eq!(seg.effect, EffectKind::ZoomIn);
        assert!((seg.silence_after - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_blank_speaker_is_dropped() {
        let seg: Segment =
            serde_json::from_str(r#"{"text":"x","start":0,"end":1,"speaker":"  "}"#).unwrap();
        assert_eq!(seg.speaker, None);
    }

    #[test]
    fn test_validate_rejects_reversed_bounds() {
        assert!(Segment::new("x", 3.0, 1.0).validate().is_err());
        assert!(Segment::new("x", 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_speakers_first_seen_order() {
        let segments = vec![
            Segment::new("a", 0.0, 1.0).with_speaker("Bob"),
            Segment::new("b", 1.0, 2.0).with_speaker("Alice"),
            Segment::new("c", 2.0, 3.0).with_speaker("Bob"),
            Segment::new("d", 3.0, 4.0),
        ];
        assert_eq!(speakers_in_order(&segments), vec!["Bob", "Alice"]);
    }
}
