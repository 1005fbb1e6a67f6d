//! Render a single request.

use std::path::PathBuf;

use reelsmith_common::config::AppConfig;
use reelsmith_render_engine::run_job;

use super::{load_job, RenderOptions};

pub async fn run(
    config: &AppConfig,
    request: PathBuf,
    output: Option<PathBuf>,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    println!("Rendering request: {}", request.display());

    let mut job = load_job(&request)?;
    if let Some(output) = output {
        job = job.with_output(output);
    }
    let ctx = options.context(config)?;

    println!("  Job: {}", job.id);
    println!("  Segments: {}", job.inputs.segments.len());
    println!("  Media: {}", job.inputs.media.len());
    println!("  Aspect: {}", job.inputs.style.aspect_ratio.as_str());

    match run_job(&ctx, &job).await {
        Ok(outcome) => {
            if !outcome.skipped.is_empty() {
                println!("  Skipped groups: {}", outcome.skipped.len());
                for skipped in &outcome.skipped {
                    println!(
                        "    - {} [{}]: {}",
                        skipped.media_id, skipped.classification, skipped.reason
                    );
                }
            }
            let fell_back = outcome.clips.iter().filter(|c| c.fell_back).count();
            if fell_back > 0 {
                println!("  Clips rendered without effect: {fell_back}");
            }
            println!("  Report: {}", outcome.report_path.display());
            println!(
                "\nRender complete: {} ({:.1}s)",
                outcome.output_path.display(),
                outcome.duration_secs
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Render failed [{}]: {e}",
            e.classification()
        )),
    }
}
