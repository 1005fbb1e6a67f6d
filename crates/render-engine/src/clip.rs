//! Effect renderer: one timeline group → one fixed-length clip.
//!
//! Images are animated with `zoompan` driven by the effect curve. Videos
//! are trimmed or looped to length and letterboxed. When the effect
//! encode fails the clip is retried once with a bare scale/pad transform.

use std::path::{Path, PathBuf};

use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::ReelResult;
use reelsmith_common::timecode::{format_ffmpeg_secs, frame_count};
use reelsmith_processing_core::effects::FadeEnvelope;
use reelsmith_processing_core::scheduler::TimelineGroup;
use reelsmith_project_model::effect::EffectKind;
use reelsmith_project_model::media::MediaAsset;
use serde::Serialize;

use crate::expr::zoompan_plan;
use crate::ffmpeg::{video_codec_args, CommandExecutor, FfmpegCommand};

/// Images are upscaled by this factor before `zoompan` to avoid jitter.
const ZOOMPAN_OVERSAMPLE: u32 = 2;

pub const CLIP_STAGE: &str = "clip";

/// Everything needed to render one clip.
#[derive(Debug, Clone)]
pub struct ClipSpec {
    pub index: usize,
    pub media: MediaAsset,
    pub effect: EffectKind,
    pub duration_secs: f64,
    pub resolution: (u32, u32),
    pub fps: u32,
    pub output: PathBuf,

    /// Known length of a video source; `None` treats it as long enough.
    pub source_duration_secs: Option<f64>,
}

impl ClipSpec {
    /// Spec for a scheduled group, clamping to the minimum clip length.
    ///
    /// Returns `None` for groups without resolved media.
    pub fn for_group(
        index: usize,
        group: &TimelineGroup,
        resolution: (u32, u32),
        render: &RenderDefaults,
        clips_dir: &Path,
    ) -> Option<Self> {
        let media = group.media.clone()?;
        Some(Self {
            index,
            source_duration_secs: media.duration_secs,
            media,
            effect: group.effect,
            duration_secs: group.duration_secs.max(render.min_clip_secs),
            resolution,
            fps: render.fps.max(1),
            output: clips_dir.join(format!("clip_{index:03}.mp4")),
        })
    }

    pub fn total_frames(&self) -> u32 {
        frame_count(self.duration_secs, self.fps)
    }
}

/// A rendered clip on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedClip {
    pub index: usize,
    pub media_id: String,
    pub effect: EffectKind,
    pub path: PathBuf,
    pub duration_secs: f64,

    /// Whether the effect-less fallback produced this clip.
    pub fell_back: bool,
}

fn letterbox(w: u32, h: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
    )
}

fn fade_filters(fade: FadeEnvelope, total_frames: u32, fps: u32) -> Vec<String> {
    let fps = fps.max(1) as f64;
    let mut filters = Vec::new();
    if fade.fade_in_frames > 0 {
        filters.push(format!(
            "fade=t=in:st=0:d={}",
            format_ffmpeg_secs(fade.fade_in_frames as f64 / fps)
        ));
    }
    if fade.fade_out_frames > 0 {
        let start = total_frames.saturating_sub(fade.fade_out_frames) as f64 / fps;
        filters.push(format!(
            "fade=t=out:st={}:d={}",
            format_ffmpeg_secs(start),
            format_ffmpeg_secs(fade.fade_out_frames as f64 / fps)
        ));
    }
    filters
}

/// Build the still-image command, with the effect curve or the fallback.
pub fn build_image_command(spec: &ClipSpec, render: &RenderDefaults, fallback: bool) -> FfmpegCommand {
    let (w, h) = spec.resolution;
    let frames = spec.total_frames();

    let filter = if fallback {
        format!("{},fps={},format=yuv420p", letterbox(w, h), spec.fps)
    } else {
        let plan = zoompan_plan(spec.effect, frames);
        let (ow, oh) = (w * ZOOMPAN_OVERSAMPLE, h * ZOOMPAN_OVERSAMPLE);
        let mut chain = vec![
            format!("scale={ow}:{oh}:force_original_aspect_ratio=increase"),
            format!("crop={ow}:{oh}"),
            format!(
                "zoompan=z='{z}':x='{x}':y='{y}':d=1:s={w}x{h}:fps={fps}",
                z = plan.zoom,
                x = plan.x,
                y = plan.y,
                fps = spec.fps
            ),
        ];
        chain.extend(fade_filters(plan.fade, frames, spec.fps));
        chain.push("setsar=1".to_string());
        chain.push("format=yuv420p".to_string());
        chain.join(",")
    };

    FfmpegCommand::new(CLIP_STAGE, &spec.output)
        .args(["-loop", "1", "-framerate"])
        .arg(spec.fps.to_string())
        .duration(spec.duration_secs)
        .input(&spec.media.path)
        .args(["-vf".to_string(), filter])
        .args(["-frames:v".to_string(), frames.to_string()])
        .args(["-r".to_string(), spec.fps.to_string()])
        .args(video_codec_args(render))
        .arg("-an")
        .expect_duration(spec.duration_secs)
        .finish()
}

/// Loop count for `-stream_loop` (extra plays after the first).
///
/// An unknown source length loops indefinitely (`-1`); `-t` still cuts the
/// clip to the target.
pub fn extra_loops(source_secs: Option<f64>, target_secs: f64) -> i64 {
    match source_secs {
        Some(src) if src > 0.0 && src < target_secs => {
            ((target_secs / src).ceil() as i64 - 1).max(0)
        }
        Some(_) => 0,
        None => -1,
    }
}

/// Build the video-source command, with or without the fade envelope.
pub fn build_video_command(spec: &ClipSpec, render: &RenderDefaults, fallback: bool) -> FfmpegCommand {
    let (w, h) = spec.resolution;
    let frames = spec.total_frames();

    let mut chain = vec![letterbox(w, h), format!("fps={}", spec.fps)];
    if !fallback && spec.effect == EffectKind::Fade {
        let plan = zoompan_plan(EffectKind::Fade, frames);
        chain.extend(fade_filters(plan.fade, frames, spec.fps));
    }
    chain.push("format=yuv420p".to_string());

    let loops = extra_loops(spec.source_duration_secs, spec.duration_secs);
    let mut cmd = FfmpegCommand::new(CLIP_STAGE, &spec.output);
    if loops != 0 {
        cmd = cmd.arg("-stream_loop").arg(loops.to_string());
    }
    cmd.input(&spec.media.path)
        .duration(spec.duration_secs)
        .args(["-vf".to_string(), chain.join(",")])
        .args(["-r".to_string(), spec.fps.to_string()])
        .args(video_codec_args(render))
        .arg("-an")
        .expect_duration(spec.duration_secs)
        .finish()
}

fn build_command(spec: &ClipSpec, render: &RenderDefaults, fallback: bool) -> FfmpegCommand {
    if spec.media.is_video() {
        build_video_command(spec, render, fallback)
    } else {
        build_image_command(spec, render, fallback)
    }
}

/// Render one clip, retrying once with the bare transform on failure.
pub fn render_clip(
    executor: &dyn CommandExecutor,
    spec: &ClipSpec,
    render: &RenderDefaults,
) -> ReelResult<RenderedClip> {
    let finished = |fell_back: bool| RenderedClip {
        index: spec.index,
        media_id: spec.media.id.clone(),
        effect: spec.effect,
        path: spec.output.clone(),
        duration_secs: spec.duration_secs,
        fell_back,
    };

    match executor.run(&build_command(spec, render, false)) {
        Ok(outcome) => {
            tracing::debug!(
                group = spec.index,
                media_id = %spec.media.id,
                effect = %spec.effect,
                elapsed_secs = outcome.elapsed_secs,
                "Clip rendered"
            );
            Ok(finished(false))
        }
        Err(err) => {
            tracing::warn!(
                group = spec.index,
                media_id = %spec.media.id,
                effect = %spec.effect,
                error = %err,
                "Effect render failed, retrying without effect"
            );
            executor.run(&build_command(spec, render, true))?;
            Ok(finished(true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::DryRunExecutor;

    fn image_spec(effect: EffectKind) -> ClipSpec {
        ClipSpec {
            index: 3,
            media: MediaAsset::image("m1", "/media/a.png"),
            effect,
            duration_secs: 4.0,
            resolution: (1920, 1080),
            fps: 25,
            output: std::env::temp_dir()
                .join(format!("reelsmith_clip_{}", std::process::id()))
                .join("clip_003.mp4"),
            source_duration_secs: None,
        }
    }

    #[test]
    fn test_image_command_uses_zoompan() {
        let cmd = build_image_command(&image_spec(EffectKind::ZoomIn), &RenderDefaults::default(), false);
        let vf = cmd.value_of("-vf").unwrap();
        assert!(vf.starts_with("scale=3840:2160:force_original_aspect_ratio=increase,crop=3840:2160,zoompan=z='"));
        assert!(vf.contains(":d=1:s=1920x1080:fps=25"));
        assert!(vf.ends_with("setsar=1,format=yuv420p"));
        assert_eq!(cmd.value_of("-loop"), Some("1"));
        assert_eq!(cmd.value_of("-frames:v"), Some("100"));
        assert_eq!(cmd.value_of("-t"), Some("4.000"));
    }

    #[test]
    fn test_fade_effect_adds_fade_filters() {
        let cmd = build_image_command(&image_spec(EffectKind::Fade), &RenderDefaults::default(), false);
        let vf = cmd.value_of("-vf").unwrap();
        assert!(vf.contains("fade=t=in:st=0:d=0.600"));
        assert!(vf.contains("fade=t=out:st=3.400:d=0.600"));
    }

    #[test]
    fn test_fallback_is_plain_letterbox() {
        let cmd = build_image_command(&image_spec(EffectKind::Pop), &RenderDefaults::default(), true);
        assert_eq!(
            cmd.value_of("-vf"),
            Some("scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=25,format=yuv420p")
        );
    }

    #[test]
    fn test_short_video_is_looped() {
        let mut spec = image_spec(EffectKind::None);
        spec.media = MediaAsset::video("v1", "/media/v.mp4", Some(1.5));
        spec.source_duration_secs = Some(1.5);
        spec.duration_secs = 4.0;

        let cmd = build_video_command(&spec, &RenderDefaults::default(), false);
        // ceil(4.0 / 1.5) = 3 plays.
        assert_eq!(cmd.value_of("-stream_loop"), Some("2"));
        assert_eq!(cmd.value_of("-t"), Some("4.000"));
        assert!(!cmd.value_of("-vf").unwrap().contains("zoompan"));
    }

    #[test]
    fn test_long_video_is_only_trimmed() {
        assert_eq!(extra_loops(Some(10.0), 4.0), 0);
        assert_eq!(extra_loops(Some(2.0), 4.0), 1);
        assert_eq!(extra_loops(Some(1.0), 4.5), 4);
    }

    #[test]
    fn test_unknown_length_video_loops_until_cut() {
        let mut spec = image_spec(EffectKind::None);
        spec.media = MediaAsset::video("v", "/media/v.mp4", None);
        spec.source_duration_secs = None;
        spec.duration_secs = 8.0;

        assert_eq!(extra_loops(None, 8.0), -1);
        let cmd = build_video_command(&spec, &RenderDefaults::default(), false);
        assert_eq!(cmd.value_of("-stream_loop"), Some("-1"));
        assert_eq!(cmd.value_of("-t"), Some("8.000"));

        let args = &cmd.args;
        let loop_at = args.iter().position(|a| a == "-stream_loop").unwrap();
        let input_at = args.iter().position(|a| a == "-i").unwrap();
        assert!(loop_at < input_at);
    }

    #[test]
    fn test_render_falls_back_once() {
        let exec = DryRunExecutor::new().fail_when_arg_contains("zoompan");
        let spec = image_spec(EffectKind::Slide);
        let clip = render_clip(&exec, &spec, &RenderDefaults::default()).unwrap();
        assert!(clip.fell_back);
        assert_eq!(exec.commands_for(CLIP_STAGE).len(), 2);
        std::fs::remove_dir_all(spec.output.parent().unwrap()).ok();
    }

    #[test]
    fn test_render_surfaces_second_failure() {
        let exec = DryRunExecutor::new().fail_stage(CLIP_STAGE);
        let err = render_clip(&exec, &image_spec(EffectKind::Pop), &RenderDefaults::default()).unwrap_err();
        assert_eq!(err.classification(), "TransformFailure");
        assert_eq!(exec.commands().len(), 2);
    }

    #[test]
    fn test_for_group_clamps_short_durations() {
        let group = TimelineGroup {
            media_id: "m1".to_string(),
            media: Some(MediaAsset::image("m1", "/media/a.png")),
            effect: EffectKind::Zoom,
            duration_secs: 0.1,
            source_segment_indices: vec![0],
        };
        let spec = ClipSpec::for_group(0, &group, (1080, 1920), &RenderDefaults::default(), Path::new("/tmp/clips")).unwrap();
        assert!((spec.duration_secs - 0.5).abs() < 1e-12);
        assert_eq!(spec.output, PathBuf::from("/tmp/clips/clip_000.mp4"));
    }
}
