//! ASS (Advanced SubStation Alpha) document writer.
//!
//! Colours are kept as `BBGGRR` hex and wrapped per context: `&HBBGGRR&`
//! in override tags, `&HAABBGGRR` in style lines.

use std::path::Path;

use reelsmith_common::error::ReelResult;
use reelsmith_common::timecode::format_ass_time;
use reelsmith_project_model::style::{CaptionPosition, CaptionStyle, ScreenCorner, StyleConfig};

use crate::animator::{CaptionEvent, CaptionTrack, Reveal, DEFAULT_STYLE};
use crate::dialogue::PositionTag;

/// Margin between dialogue text and the frame edge.
const DIALOGUE_MARGIN: u32 = 100;

/// Highlight treatment applied to the current word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightEffect {
    Color,
    Glow,
    Scale,
    Glitch,
    Bounce,
    Wave,
    Shadow,
    Gradient,
    Retro,
    Typewriter,
}

/// Colours, font and highlight treatment for a caption style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub highlight: &'static str,
    pub base: &'static str,
    pub font: &'static str,
    pub effect: HighlightEffect,
}

pub fn palette(style: CaptionStyle) -> Palette {
    use HighlightEffect as E;
    let (highlight, base, font, effect) = match style {
        CaptionStyle::Karaoke => ("00FFFF", "FFFFFF", "Arial Black", E::Color),
        CaptionStyle::Neon => ("00FF00", "FF00FF", "Impact", E::Glow),
        CaptionStyle::Fire => ("0045FF", "00A5FF", "Arial Black", E::Color),
        CaptionStyle::Minimal => ("FFFFFF", "CCCCCC", "Helvetica", E::Color),
        CaptionStyle::Bold => ("00FFFF", "FFFFFF", "Impact", E::Scale),
        CaptionStyle::Typewriter => ("00FF00", "FFFFFF", "Courier New", E::Typewriter),
        CaptionStyle::Glitch => ("FF00FF", "00FFFF", "Impact", E::Glitch),
        CaptionStyle::Bounce => ("00FF88", "FFFFFF", "Arial Black", E::Bounce),
        CaptionStyle::Wave => ("FFCC00", "FF8800", "Arial Black", E::Wave),
        CaptionStyle::Shadow => ("FFFFFF", "DDDDDD", "Impact", E::Shadow),
        CaptionStyle::Gradient => ("FF88FF", "88FFFF", "Arial Black", E::Gradient),
        CaptionStyle::Retro => ("00CCFF", "66FFFF", "Courier New", E::Retro),
    };
    Palette {
        highlight,
        base,
        font,
        effect,
    }
}

fn tag_colour(bgr: &str) -> String {
    format!("&H{bgr}&")
}

fn style_colour(bgr: &str, alpha: u8) -> String {
    format!("&H{alpha:02X}{bgr}")
}

/// Font size after the vertical-format reduction.
pub fn effective_font_size(style: &StyleConfig) -> u32 {
    let size = style.captions.font_size.max(1);
    if style.aspect_ratio.is_vertical() && size > 64 {
        (size as f64 * 0.85) as u32
    } else {
        size
    }
}

/// `(alignment, margin_v)` for a single-track position.
pub fn alignment_for(position: CaptionPosition) -> (u32, u32) {
    match position {
        CaptionPosition::Bottom => (2, 60),
        CaptionPosition::Middle => (5, 0),
        CaptionPosition::Top => (8, 40),
    }
}

/// Strip characters that ASS would read as override blocks or escapes.
pub fn escape_text(word: &str) -> String {
    word.replace('\\', "/").replace('{', "(").replace('}', ")")
}

/// Override markup for the highlighted word.
pub fn highlight_markup(palette: &Palette, word: &str, index: usize) -> String {
    let hl = tag_colour(palette.highlight);
    let swing: i32 = if index % 2 == 0 { -15 } else { 15 };
    match palette.effect {
        HighlightEffect::Color | HighlightEffect::Typewriter => format!("{{\\c{hl}}}{word}"),
        HighlightEffect::Scale => {
            format!("{{\\c{hl}\\fscx130\\fscy130\\t(0,80,\\fscx100\\fscy100)}}{word}")
        }
        HighlightEffect::Glow => {
            format!("{{\\c{hl}\\bord8\\blur5\\3c&H00FF00&}}{word}{{\\bord4\\blur0}}")
        }
        HighlightEffect::Glitch => format!(
            "{{\\c{hl}\\shad-3\\4c&HFF00FF&\\fscx110\\frz2}}{word}{{\\shad2\\fscx100\\frz0}}"
        ),
        HighlightEffect::Bounce => format!(
            "{{\\c{hl}\\fscx130\\fscy130\\fsp3\\t(0,120,\\fscx100\\fscy100)}}{word}{{\\fscx100\\fscy100\\fsp0}}"
        ),
        HighlightEffect::Wave => format!(
            "{{\\c{hl}\\frz{angle}\\fscx110}}{word}{{\\frz0\\fscx100}}",
            angle = swing / 3
        ),
        HighlightEffect::Shadow => {
            format!("{{\\c{hl}\\shad6\\4c&H000000&\\bord3}}{word}{{\\shad2\\bord4}}")
        }
        HighlightEffect::Gradient => format!(
            "{{\\c{hl}\\bord5\\3c&HFF00FF&\\fscx115\\fscy115}}{word}{{\\bord4\\fscx100\\fscy100}}"
        ),
        HighlightEffect::Retro => format!(
            "{{\\c{hl}\\bord3\\shad4\\4c&H003366&\\fsp4}}{word}{{\\bord4\\shad2\\fsp0}}"
        ),
    }
}

/// Anchor point and `\an` alignment for a dialogue slot.
pub fn dialogue_anchor(tag: PositionTag, resolution: (u32, u32), font_size: u32) -> (u32, u32, u32) {
    let (w, h) = resolution;
    let lane_offset = (tag.lane as f64 * font_size as f64 * 2.2).round() as u32;
    let top_y = (DIALOGUE_MARGIN + 50 + lane_offset).min(h);
    let bottom_y = h
        .saturating_sub(DIALOGUE_MARGIN + 80)
        .saturating_sub(lane_offset);
    let right_x = w.saturating_sub(DIALOGUE_MARGIN);
    match tag.corner {
        ScreenCorner::TopLeft => (DIALOGUE_MARGIN, top_y, 7),
        ScreenCorner::TopRight => (right_x, top_y, 9),
        ScreenCorner::BottomLeft => (DIALOGUE_MARGIN, bottom_y, 1),
        ScreenCorner::BottomRight => (right_x, bottom_y, 3),
    }
}

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

fn header(style: &StyleConfig, style_lines: &[String]) -> String {
    let (w, h) = style.aspect_ratio.resolution();
    let mut out = String::new();
    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str(&format!("PlayResX: {w}\nPlayResY: {h}\n"));
    out.push_str("WrapStyle: 2\n\n");
    out.push_str("[V4+ Styles]\n");
    out.push_str(STYLE_FORMAT);
    out.push('\n');
    for line in style_lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\n[Events]\n");
    out.push_str(EVENT_FORMAT);
    out.push('\n');
    out
}

fn single_style_line(style: &StyleConfig, palette: &Palette) -> String {
    let (alignment, margin_v) = alignment_for(style.captions.position);
    format!(
        "Style: {DEFAULT_STYLE},{font},{size},{primary},&H000000FF,&H00000000,&H80000000,1,0,0,0,100,100,0,0,1,4,2,{alignment},20,20,{margin_v},1",
        font = palette.font,
        size = effective_font_size(style),
        primary = style_colour(palette.base, 0),
    )
}

fn dialogue_style_lines(style: &StyleConfig, palette: &Palette) -> Vec<String> {
    let opacity = style.dialogue.box_opacity();
    let alpha = ((1.0 - opacity) * 255.0).round().clamp(0.0, 255.0) as u8;
    let back = format!("&H{alpha:02X}000000");
    let size = effective_font_size(style);
    [("Speaker1", 7), ("Speaker2", 3)]
        .iter()
        .map(|(name, alignment)| {
            format!(
                "Style: {name},{font},{size},{primary},{secondary},&H00000000,{back},1,0,0,0,100,100,2,0,3,0,12,{alignment},{m},{m},{m},1",
                font = palette.font,
                primary = style_colour(palette.base, 0),
                secondary = style_colour(palette.highlight, 0),
                m = DIALOGUE_MARGIN,
            )
        })
        .collect()
}

fn event_text(event: &CaptionEvent, reveal: Reveal, palette: &Palette, style: &StyleConfig) -> String {
    let base = tag_colour(palette.base);
    let current = event.highlighted_index().unwrap_or(0);

    match reveal {
        Reveal::Typewriter => {
            let visible: Vec<String> = event.tokens.iter().map(|t| escape_text(&t.word)).collect();
            format!(
                "{{\\c{base}}}{}{{\\c{hl}}}|",
                visible.join(" "),
                hl = tag_colour(palette.highlight)
            )
        }
        Reveal::Highlight => event
            .tokens
            .iter()
            .enumerate()
            .map(|(k, token)| {
                let word = escape_text(&token.word);
                if token.highlighted {
                    highlight_markup(palette, &word, k)
                } else {
                    format!("{{\\c{base}}}{word}")
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
        Reveal::Progressive => {
            let mut text = String::new();
            if let Some(tag) = event.position {
                let (x, y, an) = dialogue_anchor(
                    tag,
                    style.aspect_ratio.resolution(),
                    effective_font_size(style),
                );
                text.push_str(&format!("{{\\an{an}\\pos({x},{y})}}"));
            }
            let words: Vec<String> = event
                .tokens
                .iter()
                .enumerate()
                .map(|(k, token)| {
                    let word = escape_text(&token.word);
                    if k < current {
                        format!("{{\\alpha&H00&\\c{base}}}{word}")
                    } else if k == current {
                        format!("{{\\alpha&H00&\\c{hl}}}{word}", hl = tag_colour(palette.highlight))
                    } else {
                        format!("{{\\alpha&HFF&}}{word}")
                    }
                })
                .collect();
            text.push_str(&words.join(" "));
            text
        }
    }
}

/// Render a caption track as a complete ASS document.
pub fn render_ass(track: &CaptionTrack, style: &StyleConfig) -> String {
    let palette = palette(style.captions.style);
    let style_lines = match track.reveal {
        Reveal::Progressive => dialogue_style_lines(style, &palette),
        _ => vec![single_style_line(style, &palette)],
    };

    let mut out = header(style, &style_lines);
    for event in &track.events {
        out.push_str(&format!(
            "Dialogue: 0,{},{},{},,0,0,0,,{}\n",
            format_ass_time(event.start_ms),
            format_ass_time(event.end_ms),
            event.style_name,
            event_text(event, track.reveal, &palette, style),
        ));
    }
    out
}

/// Write the ASS document for `track` to `path`.
pub fn write_ass(track: &CaptionTrack, style: &StyleConfig, path: &Path) -> ReelResult<()> {
    std::fs::write(path, render_ass(track, style))?;
    tracing::debug!(path = %path.display(), events = track.events.len(), "Wrote ASS captions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::animate;
    use reelsmith_project_model::segment::Segment;
    use reelsmith_project_model::style::{AspectRatio, DialogueBackground};

    #[test]
    fn test_header_matches_resolution_and_alignment() {
        let style = StyleConfig {
            aspect_ratio: AspectRatio::Portrait,
            ..StyleConfig::default()
        };
        let track = animate(&[Segment::new("hello world", 0.0, 1.0)], &style);
        let doc = render_ass(&track, &style);

        assert!(doc.starts_with("[Script Info]\n"));
        assert!(doc.contains("PlayResX: 1080\nPlayResY: 1920\n"));
        // 72 * 0.85 in portrait.
        assert!(doc.contains("Style: Default,Arial Black,61,&H00FFFFFF,"));
        assert!(doc.contains(",1,4,2,2,20,20,60,1\n"));
    }

    #[test]
    fn test_highlight_event_markup() {
        let style = StyleConfig::default();
        let track = animate(&[Segment::new("one two", 0.0, 2.0)], &style);
        let doc = render_ass(&track, &style);
        assert!(doc.contains(
            "Dialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,{\\c&H00FFFF&}one {\\c&HFFFFFF&}two\n"
        ));
        assert!(doc.contains(
            "Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\c&HFFFFFF&}one {\\c&H00FFFF&}two\n"
        ));
    }

    #[test]
    fn test_typewriter_has_cursor() {
        let mut style = StyleConfig::default();
        style.captions.style = CaptionStyle::Typewriter;
        let track = animate(&[Segment::new("a b", 0.0, 1.0)], &style);
        let doc = render_ass(&track, &style);
        assert!(doc.contains(",,{\\c&HFFFFFF&}a b{\\c&H00FF00&}|\n"));
    }

    #[test]
    fn test_dialogue_styles_and_positions() {
        let mut style = StyleConfig::default();
        style.dialogue.enabled = true;
        style.dialogue.background = DialogueBackground::Transparent;
        let track = animate(
            &[
                Segment::new("left side", 0.0, 1.0).with_speaker("A"),
                Segment::new("right side", 1.0, 2.0).with_speaker("B"),
            ],
            &style,
        );
        let doc = render_ass(&track, &style);

        assert!(doc.contains("Style: Speaker1,"));
        assert!(doc.contains(",&HBF000000,1,0,0,0,100,100,2,0,3,0,12,7,100,100,100,1"));
        assert!(doc.contains("{\\an7\\pos(100,150)}"));
        assert!(doc.contains("{\\an9\\pos(1820,150)}"));
        // Second word not yet reached on the first event.
        assert!(doc.contains("{\\alpha&H00&\\c&H00FFFF&}left {\\alpha&HFF&}side"));
    }

    #[test]
    fn test_lanes_push_away_from_edge() {
        let top = dialogue_anchor(
            PositionTag {
                corner: ScreenCorner::TopLeft,
                lane: 1,
            },
            (1920, 1080),
            50,
        );
        assert_eq!(top, (100, 260, 7));
        let bottom = dialogue_anchor(
            PositionTag {
                corner: ScreenCorner::BottomRight,
                lane: 0,
            },
            (1920, 1080),
            50,
        );
        assert_eq!(bottom, (1820, 900, 3));
    }

    #[test]
    fn test_escape_text_removes_override_braces() {
        assert_eq!(escape_text("{bad}\\N"), "(bad)/N");
    }
}
