//! Plain SRT subtitles for non-animated captions.

use std::path::Path;

use reelsmith_common::error::ReelResult;
use reelsmith_common::timecode::format_srt_time;
use reelsmith_project_model::segment::Segment;

use crate::animator::segment_window_ms;

/// Generate SRT content with one cue per non-empty segment.
pub fn generate_srt(segments: &[Segment]) -> String {
    let mut output = String::new();
    let mut cue = 0;

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        cue += 1;
        let (start_ms, end_ms) = segment_window_ms(segment);

        output.push_str(&format!("{cue}\n"));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(start_ms),
            format_srt_time(end_ms),
        ));
        output.push_str(text);
        output.push_str("\n\n");
    }

    output
}

/// Save SRT subtitles to a file.
pub fn write_srt(segments: &[Segment], path: &Path) -> ReelResult<()> {
    std::fs::write(path, generate_srt(segments))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_generation() {
        let segments = vec![
            Segment::new("Hello world", 0.0, 2.5),
            Segment::new("", 2.5, 3.0),
            Segment::new("This is a test", 3.0, 5.0),
        ];

        let srt = generate_srt(&segments);
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test"));
        assert!(!srt.contains("3\n"));
    }

    #[test]
    fn test_srt_uses_explicit_duration() {
        let mut segment = Segment::new("Late cue", 61.5, 70.0);
        segment.duration = Some(1.5);
        let srt = generate_srt(&[segment]);
        assert!(srt.contains("00:01:01,500 --> 00:01:03,000"));
    }
}
