use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

use crate::error::{BackendError, TransitionError};
use crate::tasks::TaskBackend;
use crate::types::TaskRecord;

type TaskMap = RwLock<HashMap<String, TaskRecord>>;

/// Task records held in process memory. Finished records are evicted
/// `ttl_secs` after their last update; queued and running ones are kept.
#[derive(Clone)]
pub struct InMemoryTaskBackend {
    tasks: Arc<TaskMap>,
}

impl InMemoryTaskBackend {
    pub fn new(ttl_secs: u64) -> Self {
        let backend = Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        };

        Self::spawn_cleanup_task(Arc::downgrade(&backend.tasks), ttl_secs);
        backend
    }

    fn spawn_cleanup_task(tasks: Weak<TaskMap>, ttl_secs: u64) {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(Duration::from_secs(60));
            loop {
                cleanup_interval.tick().await;
                let Some(tasks) = tasks.upgrade() else {
                    break;
                };
                Self::cleanup_expired(&tasks, ttl_secs).await;
            }
        });
    }

    async fn cleanup_expired(tasks: &TaskMap, ttl_secs: u64) {
        let now = Utc::now();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);

        let mut tasks = tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, record| {
            !record.status.is_terminal() || (now - record.updated_at).num_seconds() < ttl
        });

        let evicted = before - tasks.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} expired task records", evicted);
        }
    }

    async fn update<F>(&self, task_id: &str, apply: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), TransitionError> + Send,
    {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| BackendError::NotFound(task_id.to_string()))?;
        apply(record)?;
        Ok(())
    }
}

#[async_trait]
impl TaskBackend for InMemoryTaskBackend {
    async fn insert(&self, record: TaskRecord) -> Result<(), BackendError> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, BackendError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).cloned())
    }

    async fn mark_processing(&self, task_id: &str) -> Result<(), BackendError> {
        self.update(task_id, |record| record.start()).await
    }

    async fn complete(&self, task_id: &str, payload: serde_json::Value) -> Result<(), BackendError> {
        self.update(task_id, move |record| record.succeed(payload)).await
    }

    async fn fail(&self, task_id: &str, error: String, traceback: String) -> Result<(), BackendError> {
        self.update(task_id, move |record| record.fail(error, traceback)).await
    }
}
