//! Compositor: normalise, concatenate, overlay, mux.
//!
//! Every clip is re-stamped to one frame rate and pixel format before the
//! `concat` filter. Captions and the watermark are burned in after
//! concatenation so text stays position-stable across sources.

use std::path::{Path, PathBuf};

use reelsmith_captions::{CaptionFile, CaptionFormat};
use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::{ReelError, ReelResult};
use reelsmith_common::timecode::format_ffmpeg_secs;
use reelsmith_project_model::style::{WatermarkConfig, WatermarkPosition};

use crate::audio::MixedAudio;
use crate::clip::RenderedClip;
use crate::ffmpeg::{audio_codec_args, video_codec_args, CommandExecutor, FfmpegCommand};

pub const COMPOSE_STAGE: &str = "compose";

const WATERMARK_MARGIN: u32 = 30;

/// Below this gap the last frame is not held to reach the audio length.
const PAD_EPSILON_SECS: f64 = 0.01;

/// Everything the final encode consumes.
#[derive(Debug, Clone)]
pub struct CompositeInputs<'a> {
    pub clips: &'a [RenderedClip],
    pub captions: Option<&'a CaptionFile>,
    pub audio: &'a MixedAudio,
    pub watermark: Option<&'a WatermarkConfig>,
    pub resolution: (u32, u32),
    pub fps: u32,

    /// Output length; the narration length when known.
    pub target_secs: f64,
    pub output: &'a Path,
}

/// Escape a path for use inside a quoted filter option.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''")
}

/// Escape literal text for `drawtext`.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\\\\\")
        .replace('\'', "\u{2019}")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

fn watermark_xy(position: WatermarkPosition) -> (String, String) {
    let m = WATERMARK_MARGIN;
    let x = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::BottomLeft => m.to_string(),
        WatermarkPosition::TopCenter | WatermarkPosition::BottomCenter => "(w-text_w)/2".to_string(),
        WatermarkPosition::TopRight | WatermarkPosition::BottomRight => format!("w-text_w-{m}"),
    };
    let y = match position {
        WatermarkPosition::TopLeft | WatermarkPosition::TopCenter | WatermarkPosition::TopRight => {
            m.to_string()
        }
        _ => format!("h-text_h-{m}"),
    };
    (x, y)
}

/// `drawtext` filter for a watermark.
pub fn watermark_filter(watermark: &WatermarkConfig) -> String {
    let (x, y) = watermark_xy(watermark.position);
    format!(
        "drawtext=text='{text}':fontsize={size}:fontcolor=white@{alpha:.2}:shadowcolor=black@0.5:shadowx=2:shadowy=2:x={x}:y={y}",
        text = escape_drawtext(watermark.text.trim()),
        size = watermark.font_size.max(1),
        alpha = watermark.effective_opacity(),
    )
}

/// Build the `-filter_complex` graph for `inputs`.
pub fn build_filter_graph(inputs: &CompositeInputs<'_>) -> String {
    let (w, h) = inputs.resolution;
    let mut graph = String::new();

    for idx in 0..inputs.clips.len() {
        graph.push_str(&format!(
            "[{idx}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p,setpts=PTS-STARTPTS[v{idx}];",
            fps = inputs.fps
        ));
    }
    for idx in 0..inputs.clips.len() {
        graph.push_str(&format!("[v{idx}]"));
    }
    graph.push_str(&format!(
        "concat=n={}:v=1:a=0[cat]",
        inputs.clips.len()
    ));

    let mut post: Vec<String> = Vec::new();
    let clip_secs: f64 = inputs.clips.iter().map(|c| c.duration_secs).sum();
    let shortfall = inputs.target_secs - clip_secs;
    if shortfall > PAD_EPSILON_SECS {
        post.push(format!(
            "tpad=stop_mode=clone:stop_duration={}",
            format_ffmpeg_secs(shortfall)
        ));
    }
    if let Some(captions) = inputs.captions {
        let path = escape_filter_path(&captions.path);
        post.push(match captions.format {
            CaptionFormat::Ass => format!("ass='{path}'"),
            CaptionFormat::Srt => format!("subtitles='{path}'"),
        });
    }
    if let Some(watermark) = inputs.watermark {
        post.push(watermark_filter(watermark));
    }
    if post.is_empty() {
        post.push("null".to_string());
    }

    graph.push_str(&format!(";[cat]{}[vout]", post.join(",")));
    graph
}

/// Temporary sibling the encode writes before it replaces `output`.
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.mp4".to_string());
    output.with_file_name(format!(".{name}.partial"))
}

/// Build the final encode command.
pub fn build_compose_command(inputs: &CompositeInputs<'_>, render: &RenderDefaults) -> FfmpegCommand {
    let staging = staging_path(inputs.output);
    let mut cmd = FfmpegCommand::new(COMPOSE_STAGE, &staging);
    for clip in inputs.clips {
        cmd = cmd.input(&clip.path);
    }
    cmd = cmd.input(&inputs.audio.path);

    let audio_index = inputs.clips.len();
    cmd.args(["-filter_complex".to_string(), build_filter_graph(inputs)])
        .args(["-map".to_string(), "[vout]".to_string()])
        .args(["-map".to_string(), format!("{audio_index}:a:0")])
        .args(video_codec_args(render))
        .args(audio_codec_args(render))
        .args(["-r".to_string(), inputs.fps.to_string()])
        .duration(inputs.target_secs)
        .args(["-movflags", "+faststart", "-f", "mp4"])
        .expect_duration(inputs.target_secs)
        .finish()
}

/// Encode the final artifact, replacing any previous file at the output path.
///
/// Transform failures are not retried.
pub fn compose(
    executor: &dyn CommandExecutor,
    inputs: &CompositeInputs<'_>,
    render: &RenderDefaults,
) -> ReelResult<PathBuf> {
    if inputs.clips.is_empty() {
        return Err(ReelError::NoRenderableContent);
    }
    if let Some(parent) = inputs.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let cmd = build_compose_command(inputs, render);
    let outcome = executor.run(&cmd)?;
    std::fs::rename(&cmd.output, inputs.output)?;

    tracing::info!(
        output = %inputs.output.display(),
        clips = inputs.clips.len(),
        duration_secs = inputs.target_secs,
        elapsed_secs = outcome.elapsed_secs,
        "Final video written"
    );
    Ok(inputs.output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::DryRunExecutor;
    use reelsmith_project_model::effect::EffectKind;

    fn clip(index: usize, secs: f64) -> RenderedClip {
        RenderedClip {
            index,
            media_id: format!("m{index}"),
            effect: EffectKind::None,
            path: PathBuf::from(format!("/work/clips/clip_{index:03}.mp4")),
            duration_secs: secs,
            fell_back: false,
        }
    }

    fn audio() -> MixedAudio {
        MixedAudio {
            path: PathBuf::from("/work/mixed_audio.m4a"),
            reencoded: true,
        }
    }

    #[test]
    fn test_every_input_is_normalised_before_concat() {
        let clips = vec![clip(0, 2.0), clip(1, 3.0)];
        let audio = audio();
        let inputs = CompositeInputs {
            clips: &clips,
            captions: None,
            audio: &audio,
            watermark: None,
            resolution: (1080, 1920),
            fps: 25,
            target_secs: 5.0,
            output: Path::new("/out/final.mp4"),
        };
        let graph = build_filter_graph(&inputs);
        assert_eq!(graph.matches("fps=25,format=yuv420p,setpts=PTS-STARTPTS").count(), 2);
        assert!(graph.contains("[v0][v1]concat=n=2:v=1:a=0[cat]"));
        assert!(graph.ends_with(";[cat]null[vout]"));
        let concat_at = graph.find("concat").unwrap();
        assert!(graph.rfind("setpts").unwrap() < concat_at);
    }

    #[test]
    fn test_overlays_follow_concat_in_order() {
        let clips = vec![clip(0, 4.0)];
        let audio = audio();
        let captions = CaptionFile {
            path: PathBuf::from("/work/captions.ass"),
            format: CaptionFormat::Ass,
            events: 3,
        };
        let watermark = WatermarkConfig {
            text: "@reel".to_string(),
            position: WatermarkPosition::TopCenter,
            ..WatermarkConfig::default()
        };
        let inputs = CompositeInputs {
            clips: &clips,
            captions: Some(&captions),
            audio: &audio,
            watermark: Some(&watermark),
            resolution: (1920, 1080),
            fps: 25,
            target_secs: 5.0,
            output: Path::new("/out/final.mp4"),
        };
        let graph = build_filter_graph(&inputs);
        let tpad = graph.find("tpad=stop_mode=clone:stop_duration=1.000").unwrap();
        let ass = graph.find("ass='/work/captions.ass'").unwrap();
        let text = graph.find("drawtext=text='@reel'").unwrap();
        assert!(graph.find("concat").unwrap() < tpad);
        assert!(tpad < ass && ass < text);
        assert!(graph.contains("x=(w-text_w)/2:y=30"));
    }

    #[test]
    fn test_watermark_filter_clamps_opacity() {
        let wm = WatermarkConfig {
            text: "it's 100%".to_string(),
            opacity: 0.05,
            ..WatermarkConfig::default()
        };
        let filter = watermark_filter(&wm);
        assert!(filter.contains("fontcolor=white@0.30"));
        assert!(filter.contains("shadowcolor=black@0.5:shadowx=2:shadowy=2"));
        assert!(filter.contains("x=w-text_w-30:y=h-text_h-30"));
        assert!(filter.contains("100\\%"));
        assert!(!filter.contains("it's"));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path(Path::new("C:\\subs\\a.ass")), "C\\:/subs/a.ass");
    }

    #[test]
    fn test_compose_replaces_previous_artifact() {
        let dir = std::env::temp_dir().join(format!("reelsmith_compose_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("final.mp4");
        std::fs::write(&output, b"stale").unwrap();

        let clips = vec![clip(0, 2.0), clip(1, 2.0)];
        let audio = audio();
        let inputs = CompositeInputs {
            clips: &clips,
            captions: None,
            audio: &audio,
            watermark: None,
            resolution: (1080, 1080),
            fps: 30,
            target_secs: 4.0,
            output: &output,
        };
        let exec = DryRunExecutor::new();
        let written = compose(&exec, &inputs, &RenderDefaults::default()).unwrap();

        assert_eq!(written, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "dry-run:compose\n");
        assert!(!staging_path(&output).exists());

        let cmd = &exec.commands_for(COMPOSE_STAGE)[0];
        assert_eq!(cmd.input_count(), 3);
        assert!(cmd.args.iter().any(|a| a == "2:a:0"));
        assert_eq!(cmd.value_of("-f"), Some("mp4"));
        assert_eq!(cmd.value_of("-t"), Some("4.000"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_compose_failure_is_not_retried() {
        let clips = vec![clip(0, 2.0)];
        let audio = audio();
        let output = std::env::temp_dir().join("reelsmith_compose_fail").join("final.mp4");
        let inputs = CompositeInputs {
            clips: &clips,
            captions: None,
            audio: &audio,
            watermark: None,
            resolution: (1080, 1080),
            fps: 25,
            target_secs: 2.0,
            output: &output,
        };
        let exec = DryRunExecutor::new().fail_stage(COMPOSE_STAGE);
        let err = compose(&exec, &inputs, &RenderDefaults::default()).unwrap_err();
        assert_eq!(err.classification(), "TransformFailure");
        assert_eq!(exec.commands().len(), 1);
    }
}
