//! Render jobs and their status lifecycle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::media::MediaAsset;
use crate::segment::Segment;
use crate::style::StyleConfig;

/// Status of a render job.
///
/// Transitions are monotonic: `pending -> processing -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// A pending job may fail before it starts processing (for example
    /// when it is rejected by the batch), but nothing leaves a terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one render consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInputs {
    /// Timed segments in output order.
    pub segments: Vec<Segment>,

    /// Read-only asset pool referenced by segment media ids.
    pub media: Vec<MediaAsset>,

    /// Narration track; the duration authority for the render.
    pub narration_path: PathBuf,

    /// Presentation settings.
    #[serde(default)]
    pub style: StyleConfig,
}

/// One complete, isolated render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Unique job id; names the per-job working directory.
    pub id: String,

    /// Current lifecycle state.
    #[serde(default)]
    pub status: JobStatus,

    /// Render inputs.
    pub inputs: RenderInputs,

    /// Requested artifact location; defaults to `<job dir>/final.mp4`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl RenderJob {
    pub fn new(id: impl Into<String>, inputs: RenderInputs) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            inputs,
            output_path: None,
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Job ids become directory names, so restrict them to a safe alphabet.
    pub fn validate_id(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("job id must not be empty".to_string());
        }
        if self.id == "." || self.id == ".." {
            return Err(format!("job id '{}' is reserved", self.id));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(format!(
                "job id '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
                self.id
            ));
        }
        Ok(())
    }
}
