//! Error types shared across Reelsmith crates.
//!
//! The variants mirror how the composition pipeline reacts to a failure:
//! recoverable conditions ([`ReelError::MissingAsset`],
//! [`ReelError::ProbeFailure`]) are handled locally with a logged fallback,
//! everything else fails the job that raised it.

use std::path::PathBuf;

/// Top-level error type for Reelsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Media asset missing: {path}")]
    MissingAsset { path: PathBuf },

    #[error("Media transform failed during {stage}: {message}")]
    TransformFailure { stage: String, message: String },

    #[error("Probe failed for {path}: {message}")]
    ProbeFailure { path: PathBuf, message: String },

    #[error("Narration audio missing: {path}")]
    AudioMissing { path: PathBuf },

    #[error("No renderable content: every scheduled media group was skipped")]
    NoRenderableContent,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn transform(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TransformFailure {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable classification string reported on failed jobs.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::MissingAsset { .. } => "MissingAsset",
            Self::TransformFailure { .. } => "TransformFailure",
            Self::ProbeFailure { .. } => "ProbeFailure",
            Self::AudioMissing { .. } => "AudioMissing",
            Self::NoRenderableContent => "NoRenderableContent",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::Config { .. } => "Config",
            Self::Io(_) => "Io",
            Self::Json(_) | Self::Other(_) => "Internal",
        }
    }

    /// Whether this condition must fail the job when it reaches the job boundary.
    ///
    /// Missing assets and probe failures have local fallbacks and only
    /// become job failures through [`ReelError::NoRenderableContent`].
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingAsset { .. } | Self::ProbeFailure { .. })
    }
}
