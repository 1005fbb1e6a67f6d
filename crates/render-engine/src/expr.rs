//! ffmpeg expression builders for sampled effect curves.

use reelsmith_processing_core::effects::{
    channel_points, fade_envelope, sample, simplify_series, Channel, FadeEnvelope,
};
use reelsmith_project_model::effect::EffectKind;

/// Upper bound on breakpoints per channel; keeps expressions parseable.
const MAX_EXPR_POINTS: usize = 48;

/// Simplification tolerance for zoom and offset channels.
const CHANNEL_TOLERANCE: f64 = 1e-4;

/// Build a piecewise-linear expression in `var` through `points`.
///
/// Points are `(x, value)` pairs; the result holds the first value before
/// the first point and the last value after the last point.
pub fn build_piecewise_expr(mut points: Vec<(f64, f64)>, var: &str) -> String {
    if points.is_empty() {
        return "0".to_string();
    }

    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut sanitized: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for (x, v) in points {
        if let Some((last_x, last_v)) = sanitized.last_mut() {
            if (x - *last_x).abs() < 1e-4 {
                *last_x = x;
                *last_v = v;
                continue;
            }
        }
        sanitized.push((x, v));
    }

    let Some(&(_, last_value)) = sanitized.last() else {
        return "0".to_string();
    };
    if sanitized.iter().all(|(_, v)| (v - last_value).abs() < 1e-9) {
        return format!("{last_value:.6}");
    }

    let mut expr = format!("{last_value:.6}");
    for idx in (0..sanitized.len() - 1).rev() {
        let (x0, v0) = sanitized[idx];
        let (x1, v1) = sanitized[idx + 1];

        let interp = format!(
            "{v0:.6}+({delta:.6})*({var}-{x0:.6})/{span:.6}",
            delta = v1 - v0,
            span = (x1 - x0).max(1e-4)
        );
        expr = format!("if(lt({var},{x1:.6}),{interp},{tail})", tail = expr);
    }

    if sanitized[0].0 > 0.0 {
        expr = format!(
            "if(lt({var},{x0:.6}),{v0:.6},{tail})",
            x0 = sanitized[0].0,
            v0 = sanitized[0].1,
            tail = expr
        );
    }

    expr
}

/// zoompan parameters for one effect clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoompanPlan {
    pub zoom: String,
    pub x: String,
    pub y: String,
    pub fade: FadeEnvelope,
}

/// Sample `kind` over `total_frames` and express it for `zoompan`.
///
/// zoompan cannot show more than the full input, so a curve that dips
/// below 1.0 is normalised until its smallest zoom is exactly 1.0.
pub fn zoompan_plan(kind: EffectKind, total_frames: u32) -> ZoompanPlan {
    let samples = sample(kind, total_frames);
    let min_zoom = samples
        .iter()
        .map(|t| t.zoom)
        .fold(f64::INFINITY, f64::min);
    let norm = if min_zoom.is_finite() && min_zoom < 1.0 {
        1.0 / min_zoom
    } else {
        1.0
    };

    let zoom_points: Vec<(f64, f64)> = channel_points(&samples, Channel::Zoom)
        .into_iter()
        .map(|(f, z)| (f, z * norm))
        .collect();
    let x_points = channel_points(&samples, Channel::OffsetX);
    let y_points = channel_points(&samples, Channel::OffsetY);

    let zoom = build_piecewise_expr(
        simplify_series(zoom_points, MAX_EXPR_POINTS, CHANNEL_TOLERANCE),
        "on",
    );
    let ox = build_piecewise_expr(
        simplify_series(x_points, MAX_EXPR_POINTS, CHANNEL_TOLERANCE),
        "on",
    );
    let oy = build_piecewise_expr(
        simplify_series(y_points, MAX_EXPR_POINTS, CHANNEL_TOLERANCE),
        "on",
    );

    ZoompanPlan {
        zoom,
        x: format!("iw/2-(iw/zoom/2)+({ox})*iw"),
        y: format!("ih/2-(ih/zoom/2)+({oy})*ih"),
        fade: fade_envelope(&samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piecewise_expr_single_point() {
        assert_eq!(build_piecewise_expr(vec![(0.0, 1.25)], "on"), "1.250000");
        assert_eq!(build_piecewise_expr(vec![], "on"), "0");
    }

    #[test]
    fn test_piecewise_expr_two_points() {
        let expr = build_piecewise_expr(vec![(10.0, 2.0), (0.0, 1.0)], "on");
        assert_eq!(
            expr,
            "if(lt(on,10.000000),1.000000+(1.000000)*(on-0.000000)/10.000000,2.000000)"
        );
    }

    #[test]
    fn test_piecewise_expr_holds_first_value_before_start() {
        let expr = build_piecewise_expr(vec![(5.0, 1.0), (10.0, 2.0)], "t");
        assert!(expr.starts_with("if(lt(t,5.000000),1.000000,"));
    }

    #[test]
    fn test_static_plan_is_constant() {
        let plan = zoompan_plan(EffectKind::Static, 50);
        assert_eq!(plan.zoom, "1.000000");
        assert!(plan.fade.is_empty());
    }

    #[test]
    fn test_pop_plan_is_normalised_to_unit_minimum() {
        let plan = zoompan_plan(EffectKind::Pop, 100);
        // First breakpoint is the normalised 0.85 start.
        assert!(plan.zoom.contains("1.000000+("));
        assert!(plan.zoom.ends_with("1.176471)") || plan.zoom.contains("1.176471"));
    }

    #[test]
    fn test_fade_plan_has_envelope() {
        let plan = zoompan_plan(EffectKind::Fade, 100);
        assert_eq!(plan.fade.fade_in_frames, 15);
        assert_eq!(plan.fade.fade_out_frames, 15);
    }
}
