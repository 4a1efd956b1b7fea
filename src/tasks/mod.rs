pub mod memory;
pub mod queue;
pub mod runner;

pub use memory::InMemoryTaskBackend;
pub use queue::TaskQueue;
pub use runner::TaskRunner;

use crate::error::BackendError;
use crate::types::TaskRecord;
use async_trait::async_trait;

/// Keyed store of task records.
///
/// Implementations must refuse transitions out of terminal states; the
/// lifecycle rules live on [`TaskRecord`].
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn insert(&self, record: TaskRecord) -> Result<(), BackendError>;

    async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, BackendError>;

    async fn mark_processing(&self, task_id: &str) -> Result<(), BackendError>;

    async fn complete(&self, task_id: &str, payload: serde_json::Value) -> Result<(), BackendError>;

    async fn fail(&self, task_id: &str, error: String, traceback: String) -> Result<(), BackendError>;
}
