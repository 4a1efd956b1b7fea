use std::sync::Arc;
use std::time::Instant;

use crate::ai::Reviewer;
use crate::error::{BackendError, JobError};
use crate::github::DiffSource;
use crate::tasks::TaskBackend;
use crate::types::{AnalysisRequest, AnalysisResults};

/// Runs one analysis job end to end: fetch, review, store.
pub struct TaskRunner {
    backend: Arc<dyn TaskBackend>,
    fetcher: Arc<dyn DiffSource>,
    reviewer: Arc<dyn Reviewer>,
}

impl TaskRunner {
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        fetcher: Arc<dyn DiffSource>,
        reviewer: Arc<dyn Reviewer>,
    ) -> Self {
        Self {
            backend,
            fetcher,
            reviewer,
        }
    }

    /// Drives the task to a terminal state. The returned error has already
    /// been recorded on the task.
    pub async fn run(&self, task_id: &str, request: AnalysisRequest) -> Result<(), JobError> {
        tracing::info!(
            task_id,
            "Starting task for {}/pull/{}",
            request.repo_url,
            request.pr_number
        );

        if let Err(e) = self.backend.mark_processing(task_id).await {
            let e = JobError::from(e);
            if matches!(
                e,
                JobError::Backend(BackendError::Transition(_) | BackendError::NotFound(_))
            ) {
                tracing::warn!(task_id, "Task not started: {}", e);
            } else {
                self.record_failure(task_id, &e).await;
            }
            return Err(e);
        }

        let start = Instant::now();
        let outcome = match self.analyze(task_id, &request).await {
            Ok(results) => serde_json::to_value(&results).map_err(JobError::Serialize),
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(payload) => self.backend.complete(task_id, payload).await.map_err(JobError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                tracing::info!(
                    task_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Task completed"
                );
                Ok(())
            }
            Err(e) => {
                self.record_failure(task_id, &e).await;
                Err(e)
            }
        }
    }

    async fn analyze(&self, task_id: &str, request: &AnalysisRequest) -> Result<AnalysisResults, JobError> {
        tracing::info!(task_id, "Fetching diff...");
        let diff = self
            .fetcher
            .fetch_pr_diff(&request.repo_url, request.pr_number, request.github_token.as_ref())
            .await?;

        if diff.trim().is_empty() {
            tracing::info!(task_id, "No diff content found.");
            return Err(JobError::EmptyDiff);
        }

        tracing::info!(task_id, reviewer = self.reviewer.name(), "Starting AI review...");
        let results = self
            .reviewer
            .review(&request.repo_url, request.pr_number, &diff)
            .await?;
        tracing::info!(task_id, "AI review complete.");

        Ok(results)
    }

    async fn record_failure(&self, task_id: &str, error: &JobError) {
        let message = error.user_message();
        let traceback = error.diagnostics();

        tracing::error!(
            task_id,
            kind = ?error.kind(),
            traceback = %traceback,
            "Task failed: {}",
            message
        );

        if let Err(e) = self.backend.fail(task_id, message, traceback).await {
            tracing::error!(task_id, "Could not record task failure: {}", e);
        }
    }
}
