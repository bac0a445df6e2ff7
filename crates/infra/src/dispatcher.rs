//! Fire-and-forget scheduling of job executions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use vista_core::JobId;

use crate::jobs::JobStoreError;
use crate::orchestrator::{ExecutionOutcome, Orchestrator, OrchestratorError};

/// Decouples admission from execution.
pub trait Dispatcher: Send + Sync + 'static {
    /// Run the orchestrator for `job_id` after `delay`, independently of the caller.
    fn schedule(&self, job_id: JobId, delay: Duration);
}

/// Runs each execution as its own tokio task.
///
/// Tasks are tracked so shutdown can wait for in-flight jobs instead of
/// leaving them stuck in `processing`.
#[derive(Clone)]
pub struct TokioDispatcher {
    orchestrator: Arc<Orchestrator>,
    tracker: TaskTracker,
}

impl TokioDispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tracker: TaskTracker::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait for every scheduled execution to finish.
    pub async fn close_and_drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Wait until everything scheduled so far has settled, then keep accepting work.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Dispatcher for TokioDispatcher {
    fn schedule(&self, job_id: JobId, delay: Duration) {
        let orchestrator = self.orchestrator.clone();
        self.tracker.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match orchestrator.execute(job_id).await {
                Ok(ExecutionOutcome::Completed(_)) => debug!(job_id = %job_id, "execution finished: completed"),
                Ok(ExecutionOutcome::Failed(_)) => debug!(job_id = %job_id, "execution finished: failed"),
                Err(OrchestratorError::Store(JobStoreError::AlreadyClaimed(_))) => {
                    debug!(job_id = %job_id, "job already claimed by another execution");
                }
                Err(e) => error!(job_id = %job_id, error = %e, "job execution aborted"),
            }
        });
    }
}
