//! Render many requests on a bounded worker pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use reelsmith_common::config::AppConfig;
use reelsmith_render_engine::{BatchOrchestrator, ChannelStatusSink};

use super::{load_job, RenderOptions};

pub async fn run(
    config: &AppConfig,
    requests: Vec<PathBuf>,
    jobs: Option<usize>,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let ctx = options.context(config)?;

    let mut loaded = Vec::with_capacity(requests.len());
    let mut load_failures = 0usize;
    for path in &requests {
        match load_job(path) {
            Ok(job) => loaded.push(job),
            Err(e) => {
                load_failures += 1;
                println!("{}\tfailed InvalidInput: {e}", path.display());
            }
        }
    }

    let (sink, mut updates) = ChannelStatusSink::new();
    let watcher = tokio::spawn(async move {
        let mut last = HashMap::new();
        while let Some(update) = updates.recv().await {
            tracing::info!(job_id = %update.job_id, status = %update.status, "Job status");
            last.insert(update.job_id, update.status);
        }
        last
    });

    let mut orchestrator = BatchOrchestrator::new(ctx, Arc::new(sink));
    if let Some(jobs) = jobs {
        orchestrator = orchestrator.with_pool_size(jobs);
    }
    println!(
        "Rendering {} job(s), {} at a time",
        loaded.len(),
        orchestrator.pool_size()
    );

    let results = orchestrator.run(loaded).await;
    drop(orchestrator);
    let statuses = watcher.await?;
    tracing::debug!(tracked = statuses.len(), "Status stream closed");

    let mut failed = load_failures;
    for result in &results {
        match &result.result {
            Ok(outcome) => println!(
                "{}\tcompleted {}",
                result.job_id,
                outcome.output_path.display()
            ),
            Err(failure) => {
                failed += 1;
                println!("{}\tfailed {failure}", result.job_id);
            }
        }
    }

    let total = requests.len();
    if failed > 0 {
        anyhow::bail!("{failed} of {total} job(s) failed");
    }
    println!("\nAll {total} job(s) completed.");
    Ok(())
}
