//! Segment/media scheduling.
//!
//! Decides which asset plays for how long on the output timeline.
//!
//! # Algorithm
//!
//! 1. **Resolve** each segment's media ids (empty → first pool asset).
//! 2. **Split** a segment's timeline span evenly across its media ids.
//! 3. **Merge** consecutive entries that show the same media id into one group.
//! 4. **Rescale** group durations when the total drifts from the narration
//!    length by more than the configured tolerance.
//!
//! Group durations include each segment's trailing silence so that the
//! visual timeline covers every second of narration.

use std::path::{Path, PathBuf};

use reelsmith_common::error::ReelError;
use reelsmith_project_model::effect::EffectKind;
use reelsmith_project_model::media::MediaAsset;
use reelsmith_project_model::segment::{total_timeline_secs, Segment};
use serde::Serialize;

/// Default relative mismatch tolerated before durations are rescaled.
pub const DEFAULT_RESCALE_TOLERANCE: f64 = 0.1;

/// A run of consecutive segments sharing one media asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineGroup {
    /// Media id shown for the whole group.
    pub media_id: String,

    /// Resolved asset; `None` when the id is not in the pool.
    pub media: Option<MediaAsset>,

    /// Effect of the first segment in the run.
    pub effect: EffectKind,

    /// Seconds on the output timeline (rescaled in place).
    pub duration_secs: f64,

    /// Indices into the input segment list, in order, without duplicates.
    pub source_segment_indices: Vec<usize>,
}

impl TimelineGroup {
    /// Path of the resolved asset, if any.
    pub fn media_path(&self) -> Option<&Path> {
        self.media.as_ref().map(|m| m.path.as_path())
    }
}

/// A group dropped before rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedGroup {
    pub index: usize,
    pub media_id: String,
    pub path: Option<PathBuf>,
    pub duration_secs: f64,

    /// Error classification, always `MissingAsset` for now.
    pub classification: &'static str,
    pub reason: String,
}

/// Scheduler output for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub groups: Vec<TimelineGroup>,

    /// Sum of group durations before rescaling.
    pub raw_duration_secs: f64,

    /// Narration length the timeline was fitted to.
    pub target_duration_secs: f64,

    /// Factor applied to every group; `1.0` when no rescale happened.
    pub scale_factor: f64,

    pub rescaled: bool,
}

impl Schedule {
    /// Current sum of group durations.
    pub fn total_secs(&self) -> f64 {
        self.groups.iter().map(|g| g.duration_secs).sum()
    }
}

/// Build groups from segments without rescaling.
///
/// The sum of the returned durations equals
/// [`total_timeline_secs`] of the input.
pub fn build_groups(segments: &[Segment], pool: &[MediaAsset]) -> Vec<TimelineGroup> {
    let mut groups: Vec<TimelineGroup> = Vec::new();

    for (idx, segment) in segments.iter().enumerate() {
        let span = segment.timeline_secs();

        let ids: Vec<&str> = if segment.media_ids.is_empty() {
            match pool.first() {
                Some(default) => {
                    tracing::warn!(
                        segment = idx,
                        media_id = %default.id,
                        "Segment has no media ids, using first pool asset"
                    );
                    vec![default.id.as_str()]
                }
                None => {
                    tracing::warn!(segment = idx, "Segment has no media ids and the pool is empty");
                    vec![""]
                }
            }
        } else {
            segment.media_ids.iter().map(String::as_str).collect()
        };

        let share = span / ids.len() as f64;
        for id in ids {
            if let Some(current) = groups.last_mut() {
                if current.media_id == id {
                    current.duration_secs += share;
                    if current.source_segment_indices.last() != Some(&idx) {
                        current.source_segment_indices.push(idx);
                    }
                    continue;
                }
            }

            groups.push(TimelineGroup {
                media_id: id.to_string(),
                media: pool.iter().find(|m| m.id == id).cloned(),
                effect: segment.effect,
                duration_secs: share,
                source_segment_indices: vec![idx],
            });
        }
    }

    groups
}

/// Rescale `groups` so their total matches `target_secs` when the relative
/// mismatch exceeds `tolerance`.
///
/// Returns the applied factor, or `None` when nothing changed.
pub fn rescale(groups: &mut [TimelineGroup], target_secs: f64, tolerance: f64) -> Option<f64> {
    if !target_secs.is_finite() || target_secs <= 0.0 {
        return None;
    }
    let total: f64 = groups.iter().map(|g| g.duration_secs).sum();
    if total <= 0.0 {
        return None;
    }

    let factor = target_secs / total;
    if (factor - 1.0).abs() <= tolerance.max(0.0) {
        return None;
    }

    for group in groups.iter_mut() {
        group.duration_secs *= factor;
    }
    Some(factor)
}

/// Build and fit a schedule.
///
/// `target_secs` is the probed narration length; when it is unknown the
/// summed segment timeline is used instead.
pub fn schedule(
    segments: &[Segment],
    pool: &[MediaAsset],
    target_secs: Option<f64>,
    tolerance: f64,
) -> Schedule {
    let mut groups = build_groups(segments, pool);
    let raw = groups.iter().map(|g| g.duration_secs).sum::<f64>();

    let target = match target_secs.filter(|t| t.is_finite() && *t > 0.0) {
        Some(t) => t,
        None => {
            let fallback = total_timeline_secs(segments);
            tracing::warn!(
                duration_secs = fallback,
                "Narration duration unknown, falling back to segment timeline"
            );
            fallback
        }
    };

    let applied = rescale(&mut groups, target, tolerance);
    if let Some(factor) = applied {
        tracing::info!(
            scale_factor = factor,
            raw_secs = raw,
            target_secs = target,
            "Rescaled timeline groups to narration length"
        );
    }

    tracing::debug!(groups = groups.len(), "Schedule built");

    Schedule {
        groups,
        raw_duration_secs: raw,
        target_duration_secs: target,
        scale_factor: applied.unwrap_or(1.0),
        rescaled: applied.is_some(),
    }
}

/// Drop groups whose media is unresolved or missing on disk.
///
/// Returns `(kept, skipped)`. Order of kept groups is preserved.
pub fn retain_renderable<F>(
    groups: Vec<TimelineGroup>,
    exists: F,
) -> (Vec<TimelineGroup>, Vec<SkippedGroup>)
where
    F: Fn(&Path) -> bool,
{
    let mut kept = Vec::with_capacity(groups.len());
    let mut skipped = Vec::new();

    for (index, group) in groups.into_iter().enumerate() {
        let missing = match group.media_path() {
            None => Some(ReelError::MissingAsset {
                path: PathBuf::from(&group.media_id),
            }),
            Some(path) if !exists(path) => Some(ReelError::MissingAsset {
                path: path.to_path_buf(),
            }),
            Some(_) => None,
        };

        match missing {
            Some(err) => {
                let reason = if group.media_path().is_none() {
                    format!("{err} (id not in the asset pool)")
                } else {
                    err.to_string()
                };
                tracing::warn!(
                    group = index,
                    media_id = %group.media_id,
                    duration_secs = group.duration_secs,
                    %reason,
                    "Skipping timeline group"
                );
                skipped.push(SkippedGroup {
                    index,
                    media_id: group.media_id.clone(),
                    path: group.media_path().map(Path::to_path_buf),
                    duration_secs: group.duration_secs,
                    classification: err.classification(),
                    reason,
                });
            }
            None => kept.push(group),
        }
    }

    (kept, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<MediaAsset> {
        vec![
            MediaAsset::image("img1", "/media/one.png"),
            MediaAsset::image("img2", "/media/two.png"),
        ]
    }

    #[test]
    fn test_single_asset_scenario_keeps_11s_within_default_tolerance() {
        let segments = vec![
            Segment::new("A", 0.0, 5.0).with_media(&["img1"]),
            Segment::new("B", 5.0, 9.0).with_media(&["img1"]),
            Segment::new("", 9.0, 9.0)
                .with_media(&["img1"])
                .with_silence_after(2.0),
        ];

        let groups = build_groups(&segments, &pool());
        assert_eq!(groups.len(), 1);
        assert!((groups[0].duration_secs - 11.0).abs() < 1e-9);
        assert_eq!(groups[0].source_segment_indices, vec![0, 1, 2]);

        // The 12s narration is within 10% of the 11s timeline, so nothing is
        // rescaled; the compositor holds the last frame for the remaining second.
        let loose = schedule(&segments, &pool(), Some(12.0), DEFAULT_RESCALE_TOLERANCE);
        assert_eq!(loose.groups.len(), 1);
        assert!(!loose.rescaled);
        assert!((loose.total_secs() - 11.0).abs() < 1e-9);

        let tight = schedule(&segments, &pool(), Some(12.0), 0.05);
        assert_eq!(tight.groups.len(), 1);
        assert!(tight.rescaled);
        assert!((tight.total_secs() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_rescale_applies_beyond_tolerance() {
        let segments = vec![
            Segment::new("a", 0.0, 4.0).with_media(&["img1"]),
            Segment::new("b", 4.0, 9.0).with_media(&["img2"]),
        ];
        let plan = schedule(&segments, &pool(), Some(12.0), DEFAULT_RESCALE_TOLERANCE);
        assert!(plan.rescaled);
        assert!((plan.scale_factor - 12.0 / 9.0).abs() < 1e-9);
        assert!((plan.total_secs() - 12.0).abs() < 1e-9);
        assert!((plan.groups[0].duration_secs - 4.0 * 12.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_media_split_evenly() {
        let segments = vec![Segment::new("x", 0.0, 6.0).with_media(&["img1", "img2", "img1"])];
        let groups = build_groups(&segments, &pool());
        assert_eq!(groups.len(), 3);
        for group in &groups {
            assert!((group.duration_secs - 2.0).abs() < 1e-9);
            assert_eq!(group.source_segment_indices, vec![0]);
        }
    }

    #[test]
    fn test_merge_across_segments_only_when_consecutive() {
        let segments = vec![
            Segment::new("a", 0.0, 1.0).with_media(&["img1"]),
            Segment::new("b", 1.0, 2.0).with_media(&["img2"]),
            Segment::new("c", 2.0, 3.0).with_media(&["img1"]),
        ];
        let groups = build_groups(&segments, &pool());
        let ids: Vec<&str> = groups.iter().map(|g| g.media_id.as_str()).collect();
        assert_eq!(ids, vec!["img1", "img2", "img1"]);
    }

    #[test]
    fn test_empty_media_ids_use_first_pool_asset() {
        let segments = vec![
            Segment::new("a", 0.0, 2.0),
            Segment::new("b", 2.0, 3.0).with_media(&["img1"]),
        ];
        let groups = build_groups(&segments, &pool());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].media_id, "img1");
        assert!((groups[0].duration_secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_merged_group_keeps_first_effect() {
        let segments = vec![
            Segment::new("a", 0.0, 2.0)
                .with_media(&["img1"])
                .with_effect(EffectKind::ZoomIn),
            Segment::new("b", 2.0, 3.0)
                .with_media(&["img1"])
                .with_effect(EffectKind::Fade),
        ];
        let groups = build_groups(&segments, &pool());
        assert_eq!(groups[0].effect, EffectKind::ZoomIn);
    }

    #[test]
    fn test_missing_target_falls_back_to_segments() {
        let segments = vec![Segment::new("a", 0.0, 3.0).with_media(&["img1"])];
        let plan = schedule(&segments, &pool(), None, DEFAULT_RESCALE_TOLERANCE);
        assert!((plan.target_duration_secs - 3.0).abs() < 1e-9);
        assert!(!plan.rescaled);
    }

    #[test]
    fn test_rescale_ignores_degenerate_inputs() {
        let mut groups = build_groups(
            &[Segment::new("a", 0.0, 0.0).with_media(&["img1"])],
            &pool(),
        );
        assert_eq!(rescale(&mut groups, 10.0, 0.1), None);
        assert_eq!(rescale(&mut groups, 0.0, 0.1), None);
        assert_eq!(rescale(&mut groups, f64::NAN, 0.1), None);
    }

    #[test]
    fn test_retain_renderable_skips_missing_and_unknown() {
        let segments = vec![
            Segment::new("a", 0.0, 1.0).with_media(&["img1"]),
            Segment::new("b", 1.0, 2.0).with_media(&["nope"]),
            Segment::new("c", 2.0, 3.0).with_media(&["img2"]),
        ];
        let groups = build_groups(&segments, &pool());
        let (kept, skipped) = retain_renderable(groups, |p| p.ends_with("one.png"));

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].media_id, "img1");
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].media_id, "nope");
        assert!(skipped[0].path.is_none());
        assert_eq!(skipped[1].path, Some(PathBuf::from("/media/two.png")));
        assert!(skipped.iter().all(|s| s.classification == "MissingAsset"));
        assert!(skipped[0].reason.contains("not in the asset pool"));
        assert_eq!(skipped[1].reason, "Media asset missing: /media/two.png");
    }
}
