//! Validate a render request.

use std::path::PathBuf;

use reelsmith_project_model::request::RenderRequest;
use reelsmith_project_model::segment::speakers_in_order;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating request at: {}", path.display());

    let request = RenderRequest::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load request: {e}"))?;

    println!("  Job: {}", request.id);
    println!("  Version: {}", request.version);
    let (w, h) = request.style.aspect_ratio.resolution();
    println!("  Resolution: {w}x{h}");
    println!("  Segments: {}", request.segments.len());
    println!("  Media: {}", request.media.len());
    let speakers = speakers_in_order(&request.segments);
    if !speakers.is_empty() {
        println!("  Speakers: {}", speakers.join(", "));
    }

    let errors = request.validate_sources();
    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nRequest is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Missing media is skipped at render time; missing narration fails the job.",
            errors.len()
        );
    }

    Ok(())
}
