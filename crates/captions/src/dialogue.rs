//! Two-speaker dialogue captions.
//!
//! Speakers are numbered in first-seen order. Even-indexed speakers use
//! the first configured corner, odd-indexed speakers the second. Each
//! further pair of speakers is stacked on its own lane so no two
//! speakers ever share a screen slot.

use reelsmith_project_model::segment::{speakers_in_order, Segment};
use reelsmith_project_model::style::{AspectRatio, DialogueConfig, ScreenCorner, StyleConfig};
use serde::Serialize;

use crate::animator::{
    highlight_tokens, segment_window_ms, timed_chunks, CaptionEvent, CaptionTrack, Reveal,
};

/// Screen slot for one speaker: a corner plus a stacking lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PositionTag {
    pub corner: ScreenCorner,
    pub lane: u32,
}

/// A speaker and where their captions go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerSlot {
    pub name: String,
    pub style_name: String,
    pub position: PositionTag,
}

/// Words per line in dialogue mode.
pub fn dialogue_chunk_size(aspect: AspectRatio) -> usize {
    if aspect.is_vertical() {
        4
    } else {
        6
    }
}

/// Corner pair with the second corner forced apart from the first.
fn corners(config: &DialogueConfig) -> (ScreenCorner, ScreenCorner) {
    let first = config.speaker1_position;
    let second = if config.speaker2_position == first {
        tracing::warn!(
            corner = first.as_str(),
            "Both speakers configured for the same corner, mirroring speaker 2"
        );
        first.mirrored()
    } else {
        config.speaker2_position
    };
    (first, second)
}

/// Assign a unique slot to every speaker.
pub fn assign_slots(speakers: &[String], config: &DialogueConfig) -> Vec<SpeakerSlot> {
    let (first, second) = corners(config);
    speakers
        .iter()
        .enumerate()
        .map(|(k, name)| {
            let even = k % 2 == 0;
            SpeakerSlot {
                name: name.clone(),
                style_name: if even { "Speaker1" } else { "Speaker2" }.to_string(),
                position: PositionTag {
                    corner: if even { first } else { second },
                    lane: (k / 2) as u32,
                },
            }
        })
        .collect()
}

/// Build a dialogue caption track.
///
/// Segments without a speaker are placed in the first speaker's slot.
pub fn animate_dialogue(segments: &[Segment], style: &StyleConfig) -> CaptionTrack {
    let mut speakers = speakers_in_order(segments);
    if speakers.is_empty() {
        tracing::warn!("Dialogue captions enabled but no segment names a speaker");
    }
    let has_unlabelled = segments.iter().any(|s| s.speaker.is_none());
    if speakers.is_empty() && has_unlabelled {
        speakers.push(String::new());
    }

    let slots = assign_slots(&speakers, &style.dialogue);
    let size = dialogue_chunk_size(style.aspect_ratio);

    let mut events = Vec::new();
    for (segment_index, segment) in segments.iter().enumerate() {
        let slot = segment
            .speaker
            .as_ref()
            .and_then(|name| slots.iter().find(|s| &s.name == name))
            .or_else(|| slots.first());
        let Some(slot) = slot else {
            continue;
        };

        let words = segment.words();
        let (start_ms, end_ms) = segment_window_ms(segment);
        for chunk in timed_chunks(&words, start_ms, end_ms, size) {
            for (current, word) in chunk.words.iter().enumerate() {
                events.push(CaptionEvent {
                    start_ms: word.start_ms,
                    end_ms: word.end_ms,
                    style_name: slot.style_name.clone(),
                    position: Some(slot.position),
                    tokens: highlight_tokens(&chunk, current),
                    segment_index,
                    chunk_index: chunk.index,
                });
            }
        }
    }

    tracing::debug!(
        speakers = slots.len(),
        events = events.len(),
        "Dialogue track animated"
    );

    CaptionTrack {
        reveal: Reveal::Progressive,
        events,
        speakers: slots,
    }
}
