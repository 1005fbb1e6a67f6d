//! Batch orchestration with per-job status reporting.
//!
//! Jobs run as independent tokio tasks behind a semaphore of `pool_size`
//! permits. The only state a job shares with its siblings is the status
//! record keyed by its id, written through a [`StatusSink`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use reelsmith_common::error::ReelError;
use reelsmith_project_model::job::{JobStatus, RenderJob};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::pipeline::{run_job, JobOutcome, RenderContext};

/// Why a job failed, as reported to status consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub classification: String,
    pub message: String,
}

impl JobFailure {
    pub fn from_error(err: &ReelError) -> Self {
        Self {
            classification: err.classification().to_string(),
            message: err.to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            classification: "Internal".to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.classification, self.message)
    }
}

/// One status transition for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn processing(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Processing,
            output_path: None,
            failure: None,
            at: Utc::now(),
        }
    }

    pub fn completed(job_id: impl Into<String>, output_path: PathBuf) -> Self {
        Self {
            output_path: Some(output_path),
            status: JobStatus::Completed,
            ..Self::processing(job_id)
        }
    }

    pub fn failed(job_id: impl Into<String>, failure: JobFailure) -> Self {
        Self {
            failure: Some(failure),
            status: JobStatus::Failed,
            ..Self::processing(job_id)
        }
    }
}

/// Receives job status transitions.
///
/// Each call is one complete update; implementations must apply it
/// atomically.
pub trait StatusSink: Send + Sync {
    fn publish(&self, update: StatusUpdate);
}

/// Forwards updates to the owning process over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelStatusSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelStatusSink {
    fn publish(&self, update: StatusUpdate) {
        if let Err(err) = self.tx.send(update) {
            tracing::debug!(job_id = %err.0.job_id, "Status receiver dropped");
        }
    }
}

/// In-memory status table enforcing monotonic transitions.
#[derive(Debug, Default)]
pub struct StatusBoard {
    records: Mutex<HashMap<String, StatusUpdate>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str) -> Option<StatusUpdate> {
        match self.records.lock() {
            Ok(records) => records.get(job_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(job_id).cloned(),
        }
    }

    /// All records, sorted by job id.
    pub fn snapshot(&self) -> Vec<StatusUpdate> {
        let mut all: Vec<StatusUpdate> = match self.records.lock() {
            Ok(records) => records.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        all.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        all
    }
}

impl StatusSink for StatusBoard {
    fn publish(&self, update: StatusUpdate) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = records
            .get(&update.job_id)
            .map(|r| r.status)
            .unwrap_or(JobStatus::Pending);
        if !current.can_transition_to(update.status) {
            tracing::warn!(
                job_id = %update.job_id,
                from = %current,
                to = %update.status,
                "Rejected non-monotonic status update"
            );
            return;
        }
        records.insert(update.job_id.clone(), update);
    }
}

/// Terminal result of one job in a batch.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub result: Result<JobOutcome, JobFailure>,
}

impl JobResult {
    pub fn status(&self) -> JobStatus {
        if self.result.is_ok() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        }
    }
}

/// Runs render jobs on a bounded pool.
pub struct BatchOrchestrator {
    ctx: RenderContext,
    sink: Arc<dyn StatusSink>,
    pool_size: usize,
}

impl BatchOrchestrator {
    pub fn new(ctx: RenderContext, sink: Arc<dyn StatusSink>) -> Self {
        let pool_size = ctx.render.pool_size.max(1);
        Self {
            ctx,
            sink,
            pool_size,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run every job and return their results in submission order.
    ///
    /// A second job reusing an id fails with `InvalidInput` and publishes
    /// nothing, so the first job's record stays intact.
    pub async fn run(&self, jobs: Vec<RenderJob>) -> Vec<JobResult> {
        enum Slot {
            Spawned(String, JoinHandle<JobResult>),
            Rejected(JobResult),
        }

        let permits = Arc::new(Semaphore::new(self.pool_size));
        let mut seen = HashSet::new();
        let mut outputs = HashSet::new();
        let mut slots = Vec::with_capacity(jobs.len());

        tracing::info!(jobs = jobs.len(), pool_size = self.pool_size, "Starting batch");

        for job in jobs {
            let rejection = if !seen.insert(job.id.clone()) {
                Some(format!("duplicate job id '{}'", job.id))
            } else {
                job.output_path
                    .as_ref()
                    .filter(|path| !outputs.insert(path.to_path_buf()))
                    .map(|path| format!("output path {} is claimed by another job", path.display()))
            };
            if let Some(message) = rejection {
                tracing::warn!(job_id = %job.id, %message, "Rejecting job");
                let err = ReelError::invalid_input(message);
                slots.push(Slot::Rejected(JobResult {
                    job_id: job.id,
                    result: Err(JobFailure::from_error(&err)),
                }));
                continue;
            }

            let ctx = self.ctx.clone();
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&permits);
            let span = tracing::info_span!("render_job", job_id = %job.id);
            let job_id = job.id.clone();
            let handle = tokio::spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        let failure = JobFailure::internal("worker pool closed");
                        sink.publish(StatusUpdate::failed(job.id.clone(), failure.clone()));
                        return JobResult {
                            job_id: job.id,
                            result: Err(failure),
                        };
                    };
                    execute(&ctx, sink.as_ref(), job).await
                }
                .instrument(span),
            );
            slots.push(Slot::Spawned(job_id, handle));
        }

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Rejected(result) => result,
                Slot::Spawned(job_id, handle) => match handle.await {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::error!(job_id = %job_id, error = %err, "Render task aborted");
                        let failure = JobFailure::internal(format!("render task aborted: {err}"));
                        self.sink
                            .publish(StatusUpdate::failed(job_id.clone(), failure.clone()));
                        JobResult {
                            job_id,
                            result: Err(failure),
                        }
                    }
                },
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        tracing::info!(
            completed = results.len() - failed,
            failed,
            "Batch finished"
        );
        results
    }
}

async fn execute(ctx: &RenderContext, sink: &dyn StatusSink, job: RenderJob) -> JobResult {
    sink.publish(StatusUpdate::processing(job.id.clone()));

    match run_job(ctx, &job).await {
        Ok(outcome) => {
            sink.publish(StatusUpdate::completed(
                job.id.clone(),
                outcome.output_path.clone(),
            ));
            JobResult {
                job_id: job.id,
                result: Ok(outcome),
            }
        }
        Err(err) => {
            tracing::error!(
                job_id = %job.id,
                classification = err.classification(),
                error = %err,
                "Render job failed"
            );
            let failure = JobFailure::from_error(&err);
            sink.publish(StatusUpdate::failed(job.id.clone(), failure.clone()));
            JobResult {
                job_id: job.id,
                result: Err(failure),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_enforces_monotonic_transitions() {
        let board = StatusBoard::new();
        board.publish(StatusUpdate::processing("a"));
        board.publish(StatusUpdate::completed("a", PathBuf::from("/out/a.mp4")));
        board.publish(StatusUpdate::failed(
            "a",
            JobFailure::internal("late failure"),
        ));

        let record = board.get("a").unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.output_path, Some(PathBuf::from("/out/a.mp4")));
    }

    #[test]
    fn test_board_accepts_failure_before_processing() {
        let board = StatusBoard::new();
        board.publish(StatusUpdate::failed("b", JobFailure::internal("rejected")));
        assert_eq!(board.get("b").unwrap().status, JobStatus::Failed);
        board.publish(StatusUpdate::processing("b"));
        assert_eq!(board.get("b").unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let board = StatusBoard::new();
        board.publish(StatusUpdate::processing("z"));
        board.publish(StatusUpdate::processing("m"));
        let ids: Vec<String> = board.snapshot().into_iter().map(|u| u.job_id).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelStatusSink::new();
        sink.publish(StatusUpdate::processing("a"));
        sink.publish(StatusUpdate::completed("a", PathBuf::from("/out.mp4")));
        drop(sink);

        let mut statuses = Vec::new();
        while let Some(update) = rx.recv().await {
            statuses.push(update.status);
        }
        assert_eq!(statuses, vec![JobStatus::Processing, JobStatus::Completed]);
    }

    #[test]
    fn test_failure_display() {
        let failure = JobFailure::from_error(&ReelError::NoRenderableContent);
        assert_eq!(failure.classification, "NoRenderableContent");
        assert!(failure.to_string().starts_with("NoRenderableContent: "));
    }
}
