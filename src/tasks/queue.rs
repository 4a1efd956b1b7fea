use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::BackendError;
use crate::tasks::{TaskBackend, TaskRunner};
use crate::types::{AnalysisRequest, TaskRecord, TaskState, TaskStatusResponse};

pub const QUEUED_MESSAGE: &str = "Analysis task queued successfully.";

/// Handle used by the API to enqueue jobs and read their records back.
///
/// Jobs run on the tokio runtime; at most `max_concurrent` of them are past
/// `PENDING` at any time.
#[derive(Clone)]
pub struct TaskQueue {
    backend: Arc<dyn TaskBackend>,
    runner: Arc<TaskRunner>,
    permits: Arc<Semaphore>,
}

impl TaskQueue {
    pub fn new(backend: Arc<dyn TaskBackend>, runner: Arc<TaskRunner>, max_concurrent: usize) -> Self {
        Self {
            backend,
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Records a `PENDING` task and schedules it. Never waits for the job.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<TaskStatusResponse, BackendError> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let record = TaskRecord::new(task_id.clone(), request.repo_url.clone(), request.pr_number);
        self.backend.insert(record).await?;

        let runner = self.runner.clone();
        let permits = self.permits.clone();
        let job_id = task_id.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::error!(task_id = %job_id, "Worker pool closed; task left pending");
                return;
            };
            if let Err(e) = runner.run(&job_id, request).await {
                tracing::warn!(task_id = %job_id, "Task ended in failure: {}", e);
            }
        });

        tracing::info!(task_id = %task_id, "Analysis task queued");

        Ok(TaskStatusResponse {
            task_id,
            status: TaskState::Pending,
            message: QUEUED_MESSAGE.to_string(),
        })
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, BackendError> {
        self.backend.get(task_id).await
    }
}
