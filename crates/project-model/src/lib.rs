//! Reelsmith Project Model
//!
//! Defines the data contracts the composition engine consumes:
//! - **Segments:** Timed narration text with speaker and media references
//! - **Media:** Image/video assets referenced by id
//! - **Style:** The immutable per-job presentation configuration
//! - **Jobs:** Render jobs, their inputs, and their status lifecycle
//!
//! All times are seconds on the output timeline.

pub mod effect;
pub mod job;
pub mod media;
pub mod request;
pub mod segment;
pub mod style;

pub use effect::*;
pub use job::*;
pub use media::*;
pub use request::*;
pub use segment::*;
pub use style::*;
