//! Audio mixer: narration plus optional looped background music.
//!
//! Narration is the duration authority. The background track is looped
//! with `aloop`, attenuated, and mixed without normalisation, and the
//! result is cut to the narration length. An optional disruption chain
//! runs on the mixed output.

use std::path::{Path, PathBuf};

use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::{ReelError, ReelResult};
use reelsmith_common::timecode::format_ffmpeg_secs;
use reelsmith_project_model::style::{BackgroundMusic, StyleConfig};
use serde::Serialize;

use crate::ffmpeg::{audio_codec_args, CommandExecutor, FfmpegCommand};

pub const MIX_STAGE: &str = "mix";

/// Pitch warp factor; tempo is compensated so duration is preserved.
const PITCH_WARP: f64 = 1.04;
const SAMPLE_RATE: u32 = 48_000;

/// Fixed-order disruption filters applied to the mixed stream.
pub fn disruption_chain() -> Vec<String> {
    vec![
        format!(
            "aresample={SAMPLE_RATE},asetrate={SAMPLE_RATE}*{PITCH_WARP},aresample={SAMPLE_RATE},atempo={:.6}",
            1.0 / PITCH_WARP
        ),
        "bass=g=6:f=110,treble=g=-4".to_string(),
        "volume='if(lt(mod(t,4),0.05),0.3,1)':eval=frame".to_string(),
        "aecho=0.8:0.5:20:0.15".to_string(),
        "flanger=delay=2:depth=1:speed=0.3".to_string(),
    ]
}

/// The audio track the compositor maps into the final artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixedAudio {
    pub path: PathBuf,

    /// `false` when the narration file is used as-is.
    pub reencoded: bool,
}

/// Build the `-filter_complex` graph, or `None` when nothing needs mixing.
pub fn mix_filter(music_gain: Option<f64>, disrupt: bool) -> Option<String> {
    let tail = if disrupt {
        format!(",{}", disruption_chain().join(","))
    } else {
        String::new()
    };

    match music_gain {
        Some(gain) => Some(format!(
            "[1:a]aloop=loop=-1:size=2e+09,volume={gain:.3}[bg];\
             [0:a]volume=1.0[voice];\
             [voice][bg]amix=inputs=2:duration=first:normalize=0{tail}[mix]"
        )),
        None if disrupt => Some(format!("[0:a]anull{tail}[mix]")),
        None => None,
    }
}

/// Build the mix command for `narration` and optional `music`.
pub fn build_mix_command(
    narration: &Path,
    music: Option<&BackgroundMusic>,
    disrupt: bool,
    narration_secs: Option<f64>,
    output: &Path,
    render: &RenderDefaults,
) -> Option<FfmpegCommand> {
    let filter = mix_filter(music.map(BackgroundMusic::gain), disrupt)?;

    let mut cmd = FfmpegCommand::new(MIX_STAGE, output).input(narration);
    if let Some(music) = music {
        cmd = cmd.input(&music.path);
    }
    cmd = cmd
        .args(["-filter_complex".to_string(), filter])
        .args(["-map", "[mix]", "-vn"])
        .args(audio_codec_args(render));
    if let Some(secs) = narration_secs {
        cmd = cmd.arg("-t").arg(format_ffmpeg_secs(secs)).expect_duration(secs);
    }
    Some(cmd.finish())
}

/// Produce the job's audio track in `dir`.
///
/// A missing background file is logged and skipped. A missing narration
/// file fails with [`ReelError::AudioMissing`].
pub fn mix_audio(
    executor: &dyn CommandExecutor,
    narration: &Path,
    style: &StyleConfig,
    narration_secs: Option<f64>,
    dir: &Path,
    render: &RenderDefaults,
) -> ReelResult<MixedAudio> {
    if !narration.exists() {
        return Err(ReelError::AudioMissing {
            path: narration.to_path_buf(),
        });
    }

    let music = style.music.as_ref().filter(|m| {
        let present = m.path.exists();
        if !present {
            tracing::warn!(
                path = %m.path.display(),
                "Background music missing, mixing narration only"
            );
        }
        present
    });

    let output = dir.join("mixed_audio.m4a");
    let Some(cmd) = build_mix_command(
        narration,
        music,
        style.disrupt_audio,
        narration_secs,
        &output,
        render,
    ) else {
        tracing::debug!(path = %narration.display(), "Narration passed through unchanged");
        return Ok(MixedAudio {
            path: narration.to_path_buf(),
            reencoded: false,
        });
    };

    let outcome = executor.run(&cmd)?;
    tracing::info!(
        music = music.is_some(),
        disrupt = style.disrupt_audio,
        elapsed_secs = outcome.elapsed_secs,
        "Audio mixed"
    );
    Ok(MixedAudio {
        path: output,
        reencoded: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::DryRunExecutor;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("reelsmith_audio_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_mix_filter_loops_and_does_not_normalise() {
        let filter = mix_filter(Some(0.25), false).unwrap();
        assert!(filter.starts_with("[1:a]aloop=loop=-1:size=2e+09,volume=0.250[bg];"));
        assert!(filter.contains("amix=inputs=2:duration=first:normalize=0[mix]"));
    }

    #[test]
    fn test_disruption_chain_order() {
        let filter = mix_filter(Some(0.3), true).unwrap();
        let positions: Vec<usize> = ["asetrate", "bass=", "mod(t,4)", "aecho", "flanger"]
            .iter()
            .map(|needle| filter.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        // Disruption follows the mix, not the narration input.
        assert!(filter.find("amix").unwrap() < positions[0]);
        assert!(filter.contains("atempo=0.961538"));
    }

    #[test]
    fn test_disruption_without_music() {
        let filter = mix_filter(None, true).unwrap();
        assert!(filter.starts_with("[0:a]anull,aresample=48000"));
        assert!(mix_filter(None, false).is_none());
    }

    #[test]
    fn test_passthrough_without_music_or_disruption() {
        let dir = scratch("passthrough");
        let narration = dir.join("voice.mp3");
        std::fs::write(&narration, b"audio").unwrap();

        let exec = DryRunExecutor::new();
        let mixed = mix_audio(&exec, &narration, &StyleConfig::default(), Some(12.0), &dir, &RenderDefaults::default()).unwrap();
        assert_eq!(mixed.path, narration);
        assert!(!mixed.reencoded);
        assert!(exec.commands().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mix_is_cut_to_narration() {
        let dir = scratch("mix");
        let narration = dir.join("voice.mp3");
        let music = dir.join("bed.mp3");
        std::fs::write(&narration, b"audio").unwrap();
        std::fs::write(&music, b"audio").unwrap();

        let mut style = StyleConfig::default();
        style.music = Some(BackgroundMusic { path: music, volume: 0.2 });

        let exec = DryRunExecutor::new();
        let mixed = mix_audio(&exec, &narration, &style, Some(12.5), &dir, &RenderDefaults::default()).unwrap();
        assert!(mixed.reencoded);
        assert_eq!(mixed.path, dir.join("mixed_audio.m4a"));

        let cmd = &exec.commands_for(MIX_STAGE)[0];
        assert_eq!(cmd.input_count(), 2);
        assert_eq!(cmd.value_of("-t"), Some("12.500"));
        assert_eq!(cmd.value_of("-map"), Some("[mix]"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_music_is_skipped() {
        let dir = scratch("missing_music");
        let narration = dir.join("voice.mp3");
        std::fs::write(&narration, b"audio").unwrap();

        let mut style = StyleConfig::default();
        style.music = Some(BackgroundMusic { path: dir.join("gone.mp3"), volume: 0.5 });

        let exec = DryRunExecutor::new();
        let mixed = mix_audio(&exec, &narration, &style, None, &dir, &RenderDefaults::default()).unwrap();
        assert!(!mixed.reencoded);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_narration_is_fatal() {
        let exec = DryRunExecutor::new();
        let err = mix_audio(
            &exec,
            Path::new("/nonexistent/voice.mp3"),
            &StyleConfig::default(),
            None,
            &std::env::temp_dir(),
            &RenderDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err.classification(), "AudioMissing");
    }
}
