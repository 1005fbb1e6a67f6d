//! Reelsmith Captions
//!
//! Turns timed segments into burned-in caption tracks:
//! - **Animator:** word-level highlight and typewriter tracks
//! - **Dialogue:** per-speaker corner placement with progressive reveal
//! - **Output:** ASS documents for animated tracks, plain SRT otherwise

pub mod animator;
pub mod ass;
pub mod dialogue;
pub mod output;
pub mod srt;

pub use animator::{animate, CaptionEvent, CaptionToken, CaptionTrack, Reveal};
pub use dialogue::{animate_dialogue, PositionTag};
pub use output::{write_caption_file, CaptionFile, CaptionFormat};
