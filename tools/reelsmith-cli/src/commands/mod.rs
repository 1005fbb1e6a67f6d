pub mod batch;
pub mod check;
pub mod plan;
pub mod render;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use reelsmith_common::config::AppConfig;
use reelsmith_project_model::job::RenderJob;
use reelsmith_project_model::request::RenderRequest;
use reelsmith_render_engine::{CommandExecutor, DryRunExecutor, FfmpegExecutor, RenderContext};

/// Flags shared by commands that render.
#[derive(Args, Debug, Clone)]
pub struct RenderOptions {
    /// Root directory for per-job working directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Keep intermediate clips after a successful render
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Record ffmpeg commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

impl RenderOptions {
    /// Build the render context from config plus these overrides.
    pub fn context(&self, config: &AppConfig) -> anyhow::Result<RenderContext> {
        let mut render = config.render.clone();
        if let Some(fps) = self.fps {
            render.fps = fps;
        }
        render.keep_intermediates |= self.keep_intermediates;
        render.validate()?;

        let executor: Arc<dyn CommandExecutor> = if self.dry_run {
            Arc::new(DryRunExecutor::new())
        } else {
            let ffmpeg = FfmpegExecutor::from_config(&render);
            if !ffmpeg.is_available() {
                anyhow::bail!(
                    "ffmpeg not found ({}); install it or pass --dry-run",
                    render.ffmpeg_bin
                );
            }
            Arc::new(ffmpeg)
        };

        let work_root = self
            .work_dir
            .clone()
            .unwrap_or_else(|| config.work_dir.clone());
        tracing::debug!(
            executor = executor.name(),
            work_root = %work_root.display(),
            "Render context ready"
        );
        Ok(RenderContext::new(executor, render, work_root))
    }
}

/// Load a request file and turn it into a job, printing missing sources.
pub fn load_job(path: &Path) -> anyhow::Result<RenderJob> {
    let request = RenderRequest::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load request: {e}"))?;
    for issue in request.validate_sources() {
        println!("  warning: {issue}");
    }
    Ok(request.into_job())
}
