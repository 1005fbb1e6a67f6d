//! Effect curve library.
//!
//! Every [`EffectKind`] is bound to one pure curve function
//! `(frame, total_frames) -> FrameTransform` through [`curve_for`].
//! Adding an effect means adding one enum case and one function here.
//!
//! Coordinates are relative to the source frame after it has been scaled
//! to cover the output: `zoom` is magnification (1.0 = full frame),
//! `offset_x`/`offset_y` shift the visible window centre as a fraction
//! of the frame size, and `opacity` is in `[0, 1]`.

use reelsmith_project_model::effect::EffectKind;
use serde::Serialize;

/// Upper bound for any zoom channel.
pub const MAX_ZOOM: f64 = 1.5;

/// Share of frames covered by a fade ramp at each end.
pub const FADE_FRACTION: f64 = 0.15;

/// Share of frames for the pop overshoot (and again for its settle).
pub const POP_FRACTION: f64 = 0.10;

/// Share of frames for the slide-in ramp.
pub const SLIDE_FRACTION: f64 = 0.25;

/// Visual transform for one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameTransform {
    pub zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub opacity: f64,
}

impl FrameTransform {
    pub const IDENTITY: FrameTransform = FrameTransform {
        zoom: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        opacity: 1.0,
    };

    fn zoomed(zoom: f64) -> Self {
        Self {
            zoom,
            ..Self::IDENTITY
        }
    }
}

/// Curve signature shared by every effect.
pub type CurveFn = fn(u32, u32) -> FrameTransform;

/// Curve bound to an effect.
pub fn curve_for(kind: EffectKind) -> CurveFn {
    match kind {
        EffectKind::None => drift,
        EffectKind::Static => still,
        EffectKind::Fade => fade,
        EffectKind::Pop => pop,
        EffectKind::Slide => slide,
        EffectKind::Zoom => zoom,
        EffectKind::ZoomIn => zoom_in,
        EffectKind::ZoomOut => zoom_out,
        EffectKind::PanLeft => pan_left,
        EffectKind::PanRight => pan_right,
    }
}

/// Evaluate an effect at `frame`, with offsets clamped so the visible
/// window never leaves the source frame.
pub fn evaluate(kind: EffectKind, frame: u32, total_frames: u32) -> FrameTransform {
    let total = total_frames.max(1);
    let raw = curve_for(kind)(frame.min(total - 1), total);
    let zoom = raw.zoom.clamp(0.5, MAX_ZOOM);
    let limit = max_offset(zoom.max(1.0));
    FrameTransform {
        zoom,
        offset_x: raw.offset_x.clamp(-limit, limit),
        offset_y: raw.offset_y.clamp(-limit, limit),
        opacity: raw.opacity.clamp(0.0, 1.0),
    }
}

/// Largest centre offset that keeps a window of `1/zoom` inside the frame.
pub fn max_offset(zoom: f64) -> f64 {
    ((1.0 - 1.0 / zoom.max(1.0)) / 2.0).max(0.0)
}

fn progress(frame: u32, total: u32) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    frame as f64 / (total - 1) as f64
}

fn ramp_frames(total: u32, fraction: f64) -> u32 {
    ((total as f64 * fraction - 1e-9).ceil() as u32).max(1)
}

fn drift(frame: u32, _total: u32) -> FrameTransform {
    FrameTransform::zoomed((1.0 + 0.0003 * frame as f64).min(1.05))
}

fn still(_frame: u32, _total: u32) -> FrameTransform {
    FrameTransform::IDENTITY
}

fn zoom_in(frame: u32, _total: u32) -> FrameTransform {
    FrameTransform::zoomed((1.0 + 0.0015 * frame as f64).min(MAX_ZOOM))
}

fn zoom_out(frame: u32, _total: u32) -> FrameTransform {
    FrameTransform::zoomed((MAX_ZOOM - 0.0015 * frame as f64).max(1.001))
}

fn zoom(frame: u32, total: u32) -> FrameTransform {
    FrameTransform::zoomed((1.0 + 0.25 * frame as f64 / total as f64).min(1.3))
}

fn pop(frame: u32, total: u32) -> FrameTransform {
    let rise = ramp_frames(total, POP_FRACTION);
    let scale = if frame < rise {
        0.85 + 0.20 * (frame as f64 / rise as f64)
    } else if frame < rise * 2 {
        let t = (frame - rise) as f64 / rise as f64;
        // Ease-out back to rest.
        1.05 - 0.05 * (1.0 - (1.0 - t) * (1.0 - t))
    } else {
        1.0
    };
    FrameTransform::zoomed(scale)
}

fn slide(frame: u32, total: u32) -> FrameTransform {
    let zoom = 1.15;
    let span = ramp_frames(total, SLIDE_FRACTION);
    let remaining = 1.0 - (frame as f64 / span as f64).min(1.0);
    FrameTransform {
        offset_x: max_offset(zoom) * remaining,
        ..FrameTransform::zoomed(zoom)
    }
}

fn pan_left(frame: u32, total: u32) -> FrameTransform {
    let zoom = 1.1;
    let limit = max_offset(zoom);
    FrameTransform {
        offset_x: limit - 2.0 * limit * progress(frame, total),
        ..FrameTransform::zoomed(zoom)
    }
}

fn pan_right(frame: u32, total: u32) -> FrameTransform {
    let zoom = 1.1;
    let limit = max_offset(zoom);
    FrameTransform {
        offset_x: -limit + 2.0 * limit * progress(frame, total),
        ..FrameTransform::zoomed(zoom)
    }
}

fn fade(frame: u32, total: u32) -> FrameTransform {
    let ramp = ramp_frames(total, FADE_FRACTION);
    let from_end = total - 1 - frame.min(total - 1);
    let fade_in = (frame as f64 / ramp as f64).min(1.0);
    let fade_out = (from_end as f64 / ramp as f64).min(1.0);
    FrameTransform {
        opacity: fade_in.min(fade_out),
        ..FrameTransform::zoomed((1.0 + 0.0005 * frame as f64).min(1.1))
    }
}

/// Channel of a [`FrameTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Zoom,
    OffsetX,
    OffsetY,
    Opacity,
}

impl Channel {
    fn pick(self, t: &FrameTransform) -> f64 {
        match self {
            Channel::Zoom => t.zoom,
            Channel::OffsetX => t.offset_x,
            Channel::OffsetY => t.offset_y,
            Channel::Opacity => t.opacity,
        }
    }
}

/// Sample every frame of an effect.
pub fn sample(kind: EffectKind, total_frames: u32) -> Vec<FrameTransform> {
    let total = total_frames.max(1);
    (0..total).map(|f| evaluate(kind, f, total)).collect()
}

/// Extract one channel as `(frame, value)` points.
pub fn channel_points(samples: &[FrameTransform], channel: Channel) -> Vec<(f64, f64)> {
    samples
        .iter()
        .enumerate()
        .map(|(f, t)| (f as f64, channel.pick(t)))
        .collect()
}

/// Opacity envelope expressed as fade-in/fade-out frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FadeEnvelope {
    pub fade_in_frames: u32,
    pub fade_out_frames: u32,
}

impl FadeEnvelope {
    pub fn is_empty(&self) -> bool {
        self.fade_in_frames == 0 && self.fade_out_frames == 0
    }
}

/// Derive the fade envelope from the sampled opacity channel.
pub fn fade_envelope(samples: &[FrameTransform]) -> FadeEnvelope {
    const OPAQUE: f64 = 0.999;
    let fade_in = samples.iter().take_while(|t| t.opacity < OPAQUE).count();
    if fade_in == samples.len() {
        // Never reaches full opacity: treat the whole clip as one ramp up.
        return FadeEnvelope {
            fade_in_frames: fade_in as u32,
            fade_out_frames: 0,
        };
    }
    let fade_out = samples
        .iter()
        .rev()
        .take_while(|t| t.opacity < OPAQUE)
        .count();
    FadeEnvelope {
        fade_in_frames: fade_in as u32,
        fade_out_frames: fade_out as u32,
    }
}

/// Reduce a `(x, value)` series to at most `max_points` points while
/// staying within `tolerance` of the original (Douglas–Peucker).
///
/// Endpoints are always kept.
pub fn simplify_series(points: Vec<(f64, f64)>, max_points: usize, tolerance: f64) -> Vec<(f64, f64)> {
    if points.len() <= 2 {
        return points;
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1usize)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_idx = None;
        for idx in (start + 1)..end {
            let dist = vertical_distance(points[idx], points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_idx = Some(idx);
            }
        }

        if max_dist > tolerance {
            if let Some(idx) = max_idx {
                keep[idx] = true;
                stack.push((start, idx));
                stack.push((idx, end));
            }
        }
    }

    let simplified: Vec<(f64, f64)> = points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| if k { Some(*p) } else { None })
        .collect();

    downsample(simplified, max_points)
}

fn vertical_distance(point: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    if dx.abs() < 1e-9 {
        return (point.1 - a.1).abs();
    }
    let expected = a.1 + (b.1 - a.1) * (point.0 - a.0) / dx;
    (point.1 - expected).abs()
}

fn downsample(points: Vec<(f64, f64)>, max_points: usize) -> Vec<(f64, f64)> {
    if points.len() <= max_points {
        return points;
    }

    let target = max_points.max(2);
    let last_idx = points.len() - 1;
    let mut selected = Vec::with_capacity(target);
    for i in 0..target {
        let idx = ((i as f64 / (target - 1) as f64) * last_idx as f64).round() as usize;
        selected.push(points[idx]);
    }
    selected
}
