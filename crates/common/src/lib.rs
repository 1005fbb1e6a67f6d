//! Reelsmith Common Utilities
//!
//! Shared infrastructure for all Reelsmith crates:
//! - Error taxonomy and result aliases
//! - Timecode conversions shared by the scheduler, captions, and renderer
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
