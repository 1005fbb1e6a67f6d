//! Word-level caption animation.
//!
//! Each segment's words are split into short chunks. A chunk's time span
//! is divided evenly across its words and every word gets one
//! [`CaptionEvent`] that carries the whole chunk with exactly that word
//! highlighted, so the line stays on screen while one word lights up.
//! The typewriter style instead emits the growing prefix of the chunk.

use reelsmith_common::timecode::secs_to_ms;
use reelsmith_project_model::segment::Segment;
use reelsmith_project_model::style::{AspectRatio, CaptionStyle, StyleConfig};
use serde::Serialize;

use crate::dialogue::{self, PositionTag, SpeakerSlot};

/// Minimum time any single word stays on screen.
pub const MIN_WORD_MS: u64 = 150;

/// Style name used by single-track events.
pub const DEFAULT_STYLE: &str = "Default";

/// One word of a caption line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionToken {
    pub word: String,
    pub highlighted: bool,
}

/// One time-coded caption rendering instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionEvent {
    pub start_ms: u64,
    pub end_ms: u64,
    pub style_name: String,

    /// Screen slot for dialogue events; `None` uses the style alignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionTag>,

    pub tokens: Vec<CaptionToken>,

    /// Segment this event came from.
    pub segment_index: usize,

    /// Chunk index within that segment.
    pub chunk_index: usize,
}

impl CaptionEvent {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Index of the highlighted token, if exactly one is highlighted.
    pub fn highlighted_index(&self) -> Option<usize> {
        let mut found = None;
        for (idx, token) in self.tokens.iter().enumerate() {
            if token.highlighted {
                if found.is_some() {
                    return None;
                }
                found = Some(idx);
            }
        }
        found
    }
}

/// How the writer should render tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reveal {
    /// Full chunk visible, current word highlighted.
    Highlight,
    /// Revealed prefix followed by a cursor.
    Typewriter,
    /// Words up to the current one visible, later words transparent.
    Progressive,
}

/// An ordered caption track for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionTrack {
    pub reveal: Reveal,
    pub events: Vec<CaptionEvent>,

    /// Speaker slots (dialogue tracks only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub speakers: Vec<SpeakerSlot>,
}

impl CaptionTrack {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of chunks across all segments.
    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for event in &self.events {
            let key = (event.segment_index, event.chunk_index);
            if last != Some(key) {
                count += 1;
                last = Some(key);
            }
        }
        count
    }
}

/// A word with its display window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordSlot<'a> {
    pub word: &'a str,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A chunk of consecutive words sharing one on-screen line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedChunk<'a> {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub words: Vec<WordSlot<'a>>,
}

/// Words per chunk for single-track captions.
pub fn chunk_size_for(aspect: AspectRatio) -> usize {
    if aspect.is_vertical() {
        4
    } else {
        5
    }
}

/// Split `words` spoken over `[start_ms, end_ms)` into timed chunks.
///
/// Chunks are contiguous and non-overlapping; within a chunk the word
/// slots exactly tile the chunk span. Every word gets at least
/// [`MIN_WORD_MS`], which may push the last chunk past `end_ms` when the
/// segment is too short for its word count.
pub fn timed_chunks<'a>(
    words: &[&'a str],
    start_ms: u64,
    end_ms: u64,
    chunk_size: usize,
) -> Vec<TimedChunk<'a>> {
    if words.is_empty() {
        return Vec::new();
    }

    let size = chunk_size.max(1);
    let n = words.len() as u64;
    let duration = end_ms.saturating_sub(start_ms);
    let per_word = (duration / n).max(MIN_WORD_MS);
    let chunk_total = words.len().div_ceil(size);

    words
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| {
            let first = (index * size) as u64;
            let len = chunk.len() as u64;
            let chunk_start = start_ms + first * per_word;
            let natural_end = chunk_start + len * per_word;
            let chunk_end = if index + 1 == chunk_total {
                natural_end.max(end_ms)
            } else {
                natural_end
            };

            let word_time = (chunk_end - chunk_start) / len;
            let slots = chunk
                .iter()
                .enumerate()
                .map(|(j, word)| {
                    let word_start = chunk_start + j as u64 * word_time;
                    let word_end = if j + 1 == chunk.len() {
                        chunk_end
                    } else {
                        word_start + word_time
                    };
                    WordSlot {
                        word,
                        start_ms: word_start,
                        end_ms: word_end,
                    }
                })
                .collect();

            TimedChunk {
                index,
                start_ms: chunk_start,
                end_ms: chunk_end,
                words: slots,
            }
        })
        .collect()
}

/// Spoken window of a segment in milliseconds.
pub fn segment_window_ms(segment: &Segment) -> (u64, u64) {
    let start = secs_to_ms(segment.start);
    let end = secs_to_ms(segment.start.max(0.0) + segment.duration_secs());
    (start, end.max(start))
}

/// Build the caption track for a job.
///
/// Dialogue mode takes over when enabled in the style.
pub fn animate(segments: &[Segment], style: &StyleConfig) -> CaptionTrack {
    if style.dialogue.enabled {
        return dialogue::animate_dialogue(segments, style);
    }

    let size = chunk_size_for(style.aspect_ratio);
    let reveal = if style.captions.style == CaptionStyle::Typewriter {
        Reveal::Typewriter
    } else {
        Reveal::Highlight
    };

    let mut events = Vec::new();
    for (segment_index, segment) in segments.iter().enumerate() {
        let words = segment.words();
        let (start_ms, end_ms) = segment_window_ms(segment);

        for chunk in timed_chunks(&words, start_ms, end_ms, size) {
            for (current, slot) in chunk.words.iter().enumerate() {
                let tokens = match reveal {
                    Reveal::Typewriter => prefix_tokens(&chunk, current),
                    _ => highlight_tokens(&chunk, current),
                };
                events.push(CaptionEvent {
                    start_ms: slot.start_ms,
                    end_ms: slot.end_ms,
                    style_name: DEFAULT_STYLE.to_string(),
                    position: None,
                    tokens,
                    segment_index,
                    chunk_index: chunk.index,
                });
            }
        }
    }

    tracing::debug!(
        events = events.len(),
        chunk_size = size,
        "Caption track animated"
    );

    CaptionTrack {
        reveal,
        events,
        speakers: Vec::new(),
    }
}

/// Whole chunk with the `current` word highlighted.
pub(crate) fn highlight_tokens(chunk: &TimedChunk<'_>, current: usize) -> Vec<CaptionToken> {
    chunk
        .words
        .iter()
        .enumerate()
        .map(|(k, slot)| CaptionToken {
            word: slot.word.to_string(),
            highlighted: k == current,
        })
        .collect()
}

/// Revealed prefix ending at `current`, newest word highlighted.
fn prefix_tokens(chunk: &TimedChunk<'_>, current: usize) -> Vec<CaptionToken> {
    chunk.words[..=current]
        .iter()
        .enumerate()
        .map(|(k, slot)| CaptionToken {
            word: slot.word.to_string(),
            highlighted: k == current,
        })
        .collect()
}
