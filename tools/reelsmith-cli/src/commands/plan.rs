//! Show what a render would do, without running ffmpeg.

use std::path::PathBuf;

use reelsmith_captions::animate;
use reelsmith_common::config::AppConfig;
use reelsmith_processing_core::scheduler::{retain_renderable, schedule};
use reelsmith_project_model::request::RenderRequest;
use reelsmith_render_engine::{CommandExecutor, FfmpegExecutor};
use serde::Serialize;

#[derive(Serialize)]
struct PlanSummary<'a> {
    job_id: &'a str,
    schedule: &'a reelsmith_processing_core::Schedule,
    skipped: &'a [reelsmith_processing_core::scheduler::SkippedGroup],
    caption_events: usize,
    caption_chunks: usize,
    speakers: Vec<&'a str>,
}

pub fn run(
    config: &AppConfig,
    request: PathBuf,
    narration_secs: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    let request = RenderRequest::load(&request)
        .map_err(|e| anyhow::anyhow!("Failed to load request: {e}"))?;

    let narration_secs = narration_secs.or_else(|| {
        let probe = FfmpegExecutor::from_config(&config.render);
        if !probe.ffprobe_available() {
            return None;
        }
        probe
            .probe_duration(&request.narration_path)
            .map_err(|e| tracing::warn!(error = %e, "Narration probe failed"))
            .ok()
    });

    let plan = schedule(
        &request.segments,
        &request.media,
        narration_secs,
        config.render.rescale_tolerance,
    );
    let (_, skipped) = retain_renderable(plan.groups.clone(), |p| p.exists());
    let track = animate(&request.segments, &request.style);

    if json {
        let summary = PlanSummary {
            job_id: &request.id,
            schedule: &plan,
            skipped: &skipped,
            caption_events: track.events.len(),
            caption_chunks: track.chunk_count(),
            speakers: track.speakers.iter().map(|s| s.name.as_str()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Plan for job: {}", request.id);
    println!(
        "  Timeline: {:.2}s raw -> {:.2}s target (scale {:.4}{})",
        plan.raw_duration_secs,
        plan.target_duration_secs,
        plan.scale_factor,
        if plan.rescaled { ", rescaled" } else { "" }
    );
    println!();

    println!("Groups:");
    for (idx, group) in plan.groups.iter().enumerate() {
        let missing = skipped.iter().any(|s| s.index == idx);
        println!(
            "  {idx:>3}  {:<16} {:<10} {:>7.2}s  segments {:?}{}",
            group.media_id,
            group.effect.to_string(),
            group.duration_secs,
            group.source_segment_indices,
            if missing { "  [skipped]" } else { "" }
        );
    }
    println!();

    println!("Captions:");
    println!("  Reveal: {:?}", track.reveal);
    println!("  Chunks: {}", track.chunk_count());
    println!("  Events: {}", track.events.len());
    for slot in &track.speakers {
        println!(
            "  Speaker '{}': {} lane {}",
            slot.name,
            slot.position.corner.as_str(),
            slot.position.lane
        );
    }

    if skipped.len() == plan.groups.len() {
        println!("\nNo renderable content: every group would be skipped.");
    }

    Ok(())
}
