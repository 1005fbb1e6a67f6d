//! Single-job render pipeline.
//!
//! Stages run Scheduler → Effect Renderer → Compositor. Captions and the
//! audio mix only depend on the job inputs, so they run alongside clip
//! rendering. Every ffmpeg invocation blocks, and runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reelsmith_captions::{write_caption_file, CaptionFile};
use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::{ReelError, ReelResult};
use reelsmith_processing_core::scheduler::{retain_renderable, schedule, Schedule, SkippedGroup};
use reelsmith_project_model::job::RenderJob;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::audio::{mix_audio, MixedAudio};
use crate::clip::{render_clip, ClipSpec, RenderedClip};
use crate::compositor::{compose, CompositeInputs};
use crate::ffmpeg::CommandExecutor;

pub const REPORT_FILE: &str = "render-report.json";
const CLIPS_DIR: &str = "clips";
const DEFAULT_OUTPUT: &str = "final.mp4";

/// Shared, read-only context for every job in a process.
#[derive(Clone)]
pub struct RenderContext {
    pub executor: Arc<dyn CommandExecutor>,
    pub render: RenderDefaults,

    /// Each job works in `<work_root>/<job id>`.
    pub work_root: PathBuf,
}

impl RenderContext {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        render: RenderDefaults,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            render,
            work_root: work_root.into(),
        }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_root.join(job_id)
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("executor", &self.executor.name())
            .field("render", &self.render)
            .field("work_root", &self.work_root)
            .finish()
    }
}

/// A successfully rendered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub output_path: PathBuf,
    pub duration_secs: f64,
    pub clips: Vec<RenderedClip>,
    pub skipped: Vec<SkippedGroup>,
    pub captions: Option<CaptionFile>,
    pub report_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct RenderReport<'a> {
    job_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    elapsed_secs: f64,
    narration_secs: Option<f64>,
    schedule: &'a Schedule,
    skipped: &'a [SkippedGroup],
    clips: &'a [RenderedClip],
    captions: Option<&'a CaptionFile>,
    audio: &'a MixedAudio,
    output_path: &'a Path,
}

fn join_failure(err: tokio::task::JoinError) -> ReelError {
    ReelError::Other(anyhow::anyhow!("render task failed: {err}"))
}

async fn blocking<T, F>(f: F) -> ReelResult<T>
where
    F: FnOnce() -> ReelResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(join_failure)?
}

/// Probe the narration length, falling back to the segment timeline.
async fn probe_narration(ctx: &RenderContext, path: &Path) -> Option<f64> {
    let executor = Arc::clone(&ctx.executor);
    let owned = path.to_path_buf();
    match blocking(move || executor.probe_duration(&owned)).await {
        Ok(secs) => Some(secs),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Narration probe failed, using segment timeline"
            );
            None
        }
    }
}

/// Fill in a missing video source length, then render.
fn render_group_clip(
    executor: &dyn CommandExecutor,
    mut spec: ClipSpec,
    render: &RenderDefaults,
) -> ReelResult<RenderedClip> {
    if spec.media.is_video() && spec.source_duration_secs.is_none() {
        spec.source_duration_secs = match executor.probe_duration(&spec.media.path) {
            Ok(secs) => Some(secs),
            Err(err) => {
                tracing::warn!(
                    media_id = %spec.media.id,
                    error = %err,
                    "Video probe failed, trimming without looping"
                );
                None
            }
        };
    }
    render_clip(executor, &spec, render)
}

/// Render clips with at most `clip_concurrency` encodes in flight.
///
/// Returned clips keep schedule order regardless of completion order.
async fn render_clips(ctx: &RenderContext, specs: Vec<ClipSpec>) -> ReelResult<Vec<RenderedClip>> {
    let permits = Arc::new(Semaphore::new(ctx.render.clip_concurrency.max(1)));
    let mut slots: Vec<Option<RenderedClip>> = vec![None; specs.len()];
    let mut set = JoinSet::new();

    for spec in specs {
        let permits = Arc::clone(&permits);
        let executor = Arc::clone(&ctx.executor);
        let render = ctx.render.clone();
        set.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ReelError::Other(anyhow::anyhow!("clip pool closed: {e}")))?;
            blocking(move || render_group_clip(executor.as_ref(), spec, &render)).await
        });
    }

    while let Some(joined) = set.join_next().await {
        let clip = joined.map_err(join_failure)??;
        let index = clip.index;
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(clip);
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Run one job to completion or failure.
///
/// On failure the job directory is left in place. On success the clip
/// directory is removed unless `keep_intermediates` is set.
pub async fn run_job(ctx: &RenderContext, job: &RenderJob) -> ReelResult<JobOutcome> {
    let started_at = Utc::now();
    let started = Instant::now();
    job.validate_id().map_err(ReelError::invalid_input)?;

    let inputs = &job.inputs;
    if !inputs.narration_path.exists() {
        return Err(ReelError::AudioMissing {
            path: inputs.narration_path.clone(),
        });
    }

    let job_dir = ctx.job_dir(&job.id);
    let clips_dir = job_dir.join(CLIPS_DIR);
    std::fs::create_dir_all(&clips_dir)?;
    tracing::info!(
        job_id = %job.id,
        segments = inputs.segments.len(),
        media = inputs.media.len(),
        dir = %job_dir.display(),
        "Starting render job"
    );

    let narration_secs = probe_narration(ctx, &inputs.narration_path).await;
    let plan = schedule(
        &inputs.segments,
        &inputs.media,
        narration_secs,
        ctx.render.rescale_tolerance,
    );
    let (groups, skipped) = retain_renderable(plan.groups.clone(), |p| p.exists());
    if groups.is_empty() {
        return Err(ReelError::NoRenderableContent);
    }

    let style = inputs.style.clone();
    let resolution = style.aspect_ratio.resolution();
    let specs: Vec<ClipSpec> = groups
        .iter()
        .enumerate()
        .filter_map(|(idx, group)| ClipSpec::for_group(idx, group, resolution, &ctx.render, &clips_dir))
        .collect();

    let audio_task = {
        let executor = Arc::clone(&ctx.executor);
        let narration = inputs.narration_path.clone();
        let style = style.clone();
        let dir = job_dir.clone();
        let render = ctx.render.clone();
        blocking(move || mix_audio(executor.as_ref(), &narration, &style, narration_secs, &dir, &render))
    };
    let captions_task = {
        let segments = inputs.segments.clone();
        let style = style.clone();
        let dir = job_dir.clone();
        blocking(move || write_caption_file(&segments, &style, &dir))
    };

    let (clips, audio, captions) =
        tokio::join!(render_clips(ctx, specs), audio_task, captions_task);
    let (clips, audio, captions) = (clips?, audio?, captions?);
    let fell_back = clips.iter().filter(|c| c.fell_back).count();

    let output_path = job
        .output_path
        .clone()
        .unwrap_or_else(|| job_dir.join(DEFAULT_OUTPUT));
    let target_secs = plan.target_duration_secs;
    let output_path = {
        let executor = Arc::clone(&ctx.executor);
        let render = ctx.render.clone();
        let clips = clips.clone();
        let captions = captions.clone();
        let audio = audio.clone();
        let watermark = style.active_watermark().cloned();
        let fps = ctx.render.fps.max(1);
        blocking(move || {
            let inputs = CompositeInputs {
                clips: &clips,
                captions: captions.as_ref(),
                audio: &audio,
                watermark: watermark.as_ref(),
                resolution,
                fps,
                target_secs,
                output: &output_path,
            };
            compose(executor.as_ref(), &inputs, &render)
        })
        .await?
    };

    let report_path = job_dir.join(REPORT_FILE);
    let report = RenderReport {
        job_id: &job.id,
        started_at,
        finished_at: Utc::now(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        narration_secs,
        schedule: &plan,
        skipped: &skipped,
        clips: &clips,
        captions: captions.as_ref(),
        audio: &audio,
        output_path: &output_path,
    };
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    if !ctx.render.keep_intermediates {
        if let Err(err) = std::fs::remove_dir_all(&clips_dir) {
            tracing::warn!(dir = %clips_dir.display(), error = %err, "Failed to remove intermediate clips");
        }
    }

    tracing::info!(
        job_id = %job.id,
        output = %output_path.display(),
        clips = clips.len(),
        skipped = skipped.len(),
        fell_back,
        scale_factor = plan.scale_factor,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Render job completed"
    );

    Ok(JobOutcome {
        job_id: job.id.clone(),
        output_path,
        duration_secs: target_secs,
        clips,
        skipped,
        captions,
        report_path,
    })
}
