use proptest::prelude::*;

use reelsmith_processing_core::scheduler::{build_groups, rescale, schedule};
use reelsmith_project_model::media::MediaAsset;
use reelsmith_project_model::segment::{total_timeline_secs, Segment};

fn pool() -> Vec<MediaAsset> {
    (0..4)
        .map(|i| MediaAsset::image(format!("m{i}"), format!("/media/{i}.png")))
        .collect()
}

/// Segments laid end to end with random spans, silences, and media ids.
fn arb_segments() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec(
        (
            0.0f64..8.0,
            prop_oneof![Just(0.0f64), 0.0f64..3.0],
            prop::collection::vec(0usize..5, 0..4),
        ),
        1..24,
    )
    .prop_map(|specs| {
        let mut cursor = 0.0;
        specs
            .into_iter()
            .map(|(span, silence, ids)| {
                let ids: Vec<String> = ids.into_iter().map(|i| format!("m{i}")).collect();
                let mut seg = Segment::new("w", cursor, cursor + span).with_silence_after(silence);
                seg.media_ids = ids;
                cursor += span + silence;
                seg
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn duration_is_conserved_before_rescale(segments in arb_segments()) {
        let groups = build_groups(&segments, &pool());
        let grouped: f64 = groups.iter().map(|g| g.duration_secs).sum();
        prop_assert!((grouped - total_timeline_secs(&segments)).abs() < 1e-6);
    }

    #[test]
    fn forced_rescale_hits_target(segments in arb_segments(), target in 0.5f64..600.0) {
        let mut groups = build_groups(&segments, &pool());
        let raw: f64 = groups.iter().map(|g| g.duration_secs).sum();
        prop_assume!(raw > 1e-3);

        rescale(&mut groups, target, 0.0);
        let total: f64 = groups.iter().map(|g| g.duration_secs).sum();
        prop_assert!((total - target).abs() <= target * 0.01);
    }

    #[test]
    fn tolerant_rescale_stays_within_tolerance(segments in arb_segments(), target in 0.5f64..600.0) {
        let plan = schedule(&segments, &pool(), Some(target), 0.1);
        prop_assume!(plan.raw_duration_secs > 1e-3);

        let residual = target / plan.total_secs();
        prop_assert!((residual - 1.0).abs() <= 0.1 + 1e-9);
    }

    #[test]
    fn consecutive_groups_never_share_media(segments in arb_segments()) {
        let groups = build_groups(&segments, &pool());
        for pair in groups.windows(2) {
            prop_assert_ne!(&pair[0].media_id, &pair[1].media_id);
        }
    }
}
