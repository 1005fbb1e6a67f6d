//! Reelsmith Render Engine
//!
//! Turns a render job into a finished short video by driving ffmpeg.
//!
//! # Pipeline Architecture
//!
//! ```text
//! segments + media ──► Scheduler ──► TimelineGroups
//!                                        │
//!                                        ├── Effect Renderer (per group) ──► clips/*.mp4
//! segments + style ──► Caption Animator ─┼──────────────────────────────► captions.ass|srt
//! narration + music ─► Audio Mixer ──────┼──────────────────────────────► mixed_audio.m4a
//!                                        ▼
//!                                   Compositor
//!                      (normalise ► concat ► captions ► watermark)
//!                                        │
//!                                        ▼
//!                                    final.mp4
//! ```
//!
//! The [`batch::BatchOrchestrator`] runs many such jobs on a bounded pool
//! and reports status through a [`batch::StatusSink`].

pub mod audio;
pub mod batch;
pub mod clip;
pub mod compositor;
pub mod expr;
pub mod ffmpeg;
pub mod pipeline;

pub use audio::{mix_audio, MixedAudio};
pub use batch::{
    BatchOrchestrator, ChannelStatusSink, JobFailure, JobResult, StatusBoard, StatusSink,
    StatusUpdate,
};
pub use clip::{render_clip, ClipSpec, RenderedClip};
pub use compositor::{compose, CompositeInputs};
pub use ffmpeg::{CommandExecutor, DryRunExecutor, FfmpegCommand, FfmpegExecutor};
pub use pipeline::{run_job, JobOutcome, RenderContext};
