//! Check system capabilities.

use reelsmith_common::config::AppConfig;
use reelsmith_render_engine::{CommandExecutor, FfmpegExecutor};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelsmith System Check");
    println!("{}", "=".repeat(50));

    let render = &config.render;
    let executor = FfmpegExecutor::from_config(render);

    let ffmpeg_ok = executor.is_available();
    if ffmpeg_ok {
        println!("[OK] ffmpeg: {}", render.ffmpeg_bin);
    } else {
        println!("[MISSING] ffmpeg: {} (required for rendering)", render.ffmpeg_bin);
    }

    if executor.ffprobe_available() {
        println!("[OK] ffprobe: {}", render.ffprobe_bin);
    } else {
        println!(
            "[WARN] ffprobe: {} not found; narration length falls back to segment timing",
            render.ffprobe_bin
        );
    }

    println!();
    println!("Render defaults:");
    println!("  Frame rate: {} fps", render.fps);
    println!("  Batch pool size: {}", render.pool_size);
    println!("  Clip concurrency: {}", render.clip_concurrency);
    println!("  Rescale tolerance: {}", render.rescale_tolerance);
    println!("  x264: preset {} crf {}", render.preset, render.crf);
    println!("  Work dir: {}", config.work_dir.display());

    if let Err(e) = render.validate() {
        println!("\n[WARN] {e}");
    }

    println!();
    if ffmpeg_ok {
        println!("All required capabilities are available. Reelsmith is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
