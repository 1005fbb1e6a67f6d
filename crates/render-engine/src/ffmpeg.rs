//! ffmpeg command building and execution.
//!
//! Commands are built as structured argument lists ([`FfmpegCommand`]) so
//! clip, mix and compose logic can be tested without spawning a process.
//! A [`CommandExecutor`] runs them; [`FfmpegExecutor`] talks to the real
//! binaries and [`DryRunExecutor`] records commands instead.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Instant;

use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::{ReelError, ReelResult};
use reelsmith_common::timecode::format_ffmpeg_secs;

/// A fully built ffmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    /// Pipeline stage, used for error classification and logs.
    pub stage: String,

    /// Arguments after the binary name.
    pub args: Vec<String>,

    /// File the command produces.
    pub output: PathBuf,

    /// Expected output length, for progress reporting.
    pub expected_duration_secs: Option<f64>,
}

impl FfmpegCommand {
    /// Start a command with the global flags every invocation uses.
    pub fn new(stage: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            args: vec![
                "-hide_banner".to_string(),
                "-nostdin".to_string(),
                "-y".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-progress".to_string(),
                "pipe:1".to_string(),
                "-nostats".to_string(),
            ],
            output: output.into(),
            expected_duration_secs: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `-i <path>`.
    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path.to_string_lossy())
    }

    /// Add `-t <secs>`.
    pub fn duration(self, secs: f64) -> Self {
        self.arg("-t").arg(format_ffmpeg_secs(secs))
    }

    pub fn expect_duration(mut self, secs: f64) -> Self {
        self.expected_duration_secs = Some(secs);
        self
    }

    /// Append the output path as the final argument.
    pub fn finish(self) -> Self {
        let out = self.output.to_string_lossy().into_owned();
        self.arg(out)
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Number of `-i` inputs.
    pub fn input_count(&self) -> usize {
        self.args.iter().filter(|a| *a == "-i").count()
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub elapsed_secs: f64,
    pub out_time_secs: f64,
}

/// Runs ffmpeg commands and probes media.
///
/// Calls block until the process exits; async callers wrap them in
/// `spawn_blocking`.
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion.
    fn run(&self, command: &FfmpegCommand) -> ReelResult<CommandOutcome>;

    /// Duration of a media file in seconds.
    fn probe_duration(&self, path: &Path) -> ReelResult<f64>;

    /// Check if the executor can run on this system.
    fn is_available(&self) -> bool;

    /// Executor name.
    fn name(&self) -> &str;
}

/// Video codec arguments shared by clip and compose steps.
pub fn video_codec_args(render: &RenderDefaults) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        render.preset.clone(),
        "-crf".to_string(),
        render.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

/// Audio codec arguments for AAC output.
pub fn audio_codec_args(render: &RenderDefaults) -> Vec<String> {
    vec![
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", render.audio_bitrate_kbps.max(64)),
    ]
}

/// Executor backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegExecutor {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    pub fn from_config(render: &RenderDefaults) -> Self {
        Self::new(render.ffmpeg_bin.clone(), render.ffprobe_bin.clone())
    }

    pub fn ffprobe_available(&self) -> bool {
        command_exists(&self.ffprobe_bin)
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl CommandExecutor for FfmpegExecutor {
    fn run(&self, command: &FfmpegCommand) -> ReelResult<CommandOutcome> {
        let stage = command.stage.as_str();
        tracing::debug!(stage, args = ?command.args, "Running ffmpeg");
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ReelError::transform(stage, format!("failed to start ffmpeg: {e}")))?;

        tracing::debug!(
            stage,
            pid = child.id(),
            args_len = command.args.len(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::transform(stage, "failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::transform(stage, "failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();

        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = Instant::now();
        loop {
            line.clear();
            let bytes = match reader.read_line(&mut line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let stderr_output = abort_child(&mut child, stderr_task);
                    return Err(ReelError::transform(
                        stage,
                        format!("failed reading ffmpeg progress: {e}: {}", stderr_output.trim()),
                    ));
                }
            };
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = Instant::now();
            }
            if let Some(expected) = command.expected_duration_secs.filter(|d| *d > 0.0) {
                tracing::trace!(
                    stage,
                    percent = (latest.out_time_secs / expected * 100.0).clamp(0.0, 100.0),
                    "ffmpeg progress"
                );
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    stage,
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| ReelError::transform(stage, format!("failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelError::transform(
                stage,
                format!("ffmpeg exited with {status}: {}", stderr_output.trim()),
            ));
        }

        Ok(CommandOutcome {
            elapsed_secs: start.elapsed().as_secs_f64(),
            out_time_secs: latest.out_time_secs,
        })
    }

    fn probe_duration(&self, path: &Path) -> ReelResult<f64> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|e| ReelError::probe(path, format!("failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelError::probe(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| ReelError::probe(path, "no usable duration in ffprobe output"))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_bin)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn parse_probe_duration(raw: &str) -> Option<f64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Check whether a binary is on `PATH`.
/// Kill a running child, reap it and collect whatever stderr it produced.
fn abort_child(child: &mut Child, stderr_task: JoinHandle<String>) -> String {
    if let Err(err) = child.kill() {
        tracing::debug!(error = %err, "ffmpeg already exited");
    }
    if let Err(err) = child.wait() {
        tracing::warn!(error = %err, "Failed to reap ffmpeg");
    }
    stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
}

pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

/// Executor that records commands and fakes their outputs.
///
/// Each run writes a small placeholder file at the command's output path.
/// Failures can be injected by stage name or by argument substring.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    recorded: Mutex<Vec<FfmpegCommand>>,
    fail_stages: HashSet<String>,
    fail_args_containing: Vec<String>,
    durations: HashMap<PathBuf, f64>,
    default_duration: Option<f64>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command of `stage`.
    pub fn fail_stage(mut self, stage: impl Into<String>) -> Self {
        self.fail_stages.insert(stage.into());
        self
    }

    /// Fail every command with an argument containing `needle`.
    pub fn fail_when_arg_contains(mut self, needle: impl Into<String>) -> Self {
        self.fail_args_containing.push(needle.into());
        self
    }

    /// Report `secs` when probing `path`.
    pub fn with_duration(mut self, path: impl Into<PathBuf>, secs: f64) -> Self {
        self.durations.insert(path.into(), secs);
        self
    }

    /// Report `secs` for every path without an explicit duration.
    pub fn with_default_duration(mut self, secs: f64) -> Self {
        self.default_duration = Some(secs);
        self
    }

    /// Commands run so far, in execution order.
    pub fn commands(&self) -> Vec<FfmpegCommand> {
        match self.recorded.lock() {
            Ok(recorded) => recorded.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn commands_for(&self, stage: &str) -> Vec<FfmpegCommand> {
        self.commands()
            .into_iter()
            .filter(|c| c.stage == stage)
            .collect()
    }

    fn should_fail(&self, command: &FfmpegCommand) -> bool {
        self.fail_stages.contains(&command.stage)
            || self
                .fail_args_containing
                .iter()
                .any(|needle| command.args.iter().any(|a| a.contains(needle.as_str())))
    }
}

impl CommandExecutor for DryRunExecutor {
    fn run(&self, command: &FfmpegCommand) -> ReelResult<CommandOutcome> {
        match self.recorded.lock() {
            Ok(mut recorded) => recorded.push(command.clone()),
            Err(poisoned) => poisoned.into_inner().push(command.clone()),
        }

        if self.should_fail(command) {
            return Err(ReelError::transform(
                command.stage.clone(),
                "injected dry-run failure",
            ));
        }

        if let Some(parent) = command.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&command.output, format!("dry-run:{}\n", command.stage))?;

        Ok(CommandOutcome {
            elapsed_secs: 0.0,
            out_time_secs: command.expected_duration_secs.unwrap_or(0.0),
        })
    }

    fn probe_duration(&self, path: &Path) -> ReelResult<f64> {
        self.durations
            .get(path)
            .copied()
            .or(self.default_duration)
            .ok_or_else(|| ReelError::probe(path, "dry run has no duration for this file"))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
