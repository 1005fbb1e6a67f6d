//! Reelsmith Processing Core
//!
//! Pure planning for a render:
//! - **Scheduler:** turn timed segments into media timeline groups fitted to the narration
//! - **Effects:** deterministic per-frame transform curves for each effect kind
//!
//! This crate is pure computation: no I/O, no process execution.
//! All inputs are data; all outputs are data.

pub mod effects;
pub mod scheduler;

pub use effects::{curve_for, FrameTransform};
pub use scheduler::{schedule, Schedule, TimelineGroup};
