//! Timecode utilities shared by the scheduler, caption animator, and renderer.
//!
//! The output timeline is expressed in seconds (`f64`) while caption
//! events are frame-accurate integer milliseconds. These helpers are the
//! only place where the two representations are converted.

/// Convert seconds to whole milliseconds (rounded, negative clamped to zero).
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round() as u64
}

/// Number of frames needed to cover `duration_secs` at `fps` (at least one).
pub fn frame_count(duration_secs: f64, fps: u32) -> u32 {
    let frames = (duration_secs.max(0.0) * fps.max(1) as f64).round() as u32;
    frames.max(1)
}

/// Format milliseconds as an ASS timestamp: `H:MM:SS.cc` (centiseconds).
pub fn format_ass_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let centis = (ms % 1000) / 10;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Format milliseconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds for ffmpeg duration arguments.
pub fn format_ffmpeg_secs(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
