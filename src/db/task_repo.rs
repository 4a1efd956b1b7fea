use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};

use crate::db::MongoClient;
use crate::error::{BackendError, TransitionError};
use crate::tasks::TaskBackend;
use crate::types::{TaskRecord, TaskState, FAIL_FROM};

const COLLECTION: &str = "analysis_tasks";

/// Task records in MongoDB. Every transition is one conditional update on
/// the expected source state, so a terminal record is never rewritten.
pub struct MongoTaskBackend {
    client: MongoClient,
}

impl MongoTaskBackend {
    pub async fn new(client: MongoClient, ttl_secs: u64) -> Result<Self, BackendError> {
        let backend = Self { client };
        backend.ensure_ttl_index(ttl_secs).await?;
        Ok(backend)
    }

    fn collection(&self) -> Collection<TaskRecord> {
        self.client.database().collection(COLLECTION)
    }

    async fn ensure_ttl_index(&self, ttl_secs: u64) -> Result<(), BackendError> {
        let index = IndexModel::builder()
            .keys(doc! { "updated_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(ttl_secs))
                    .partial_filter_expression(expiry_filter())
                    .build(),
            )
            .build();

        self.collection().create_index(index).await?;
        Ok(())
    }

    async fn transition(
        &self,
        task_id: &str,
        from: &[TaskState],
        to: TaskState,
        fields: Document,
    ) -> Result<(), BackendError> {
        let result = self
            .collection()
            .update_one(transition_filter(task_id, from), status_update(to, fields))
            .await?;

        if result.matched_count > 0 {
            return Ok(());
        }

        match self.get(task_id).await? {
            Some(record) => Err(TransitionError {
                from: record.status,
                to,
            }
            .into()),
            None => Err(BackendError::NotFound(task_id.to_string())),
        }
    }
}

fn transition_filter(task_id: &str, from: &[TaskState]) -> Document {
    let states: Vec<&str> = from.iter().map(TaskState::as_str).collect();
    doc! { "_id": task_id, "status": { "$in": states } }
}

/// Only finished tasks expire; queued and running ones are kept.
fn expiry_filter() -> Document {
    doc! { "status": { "$in": [TaskState::Success.as_str(), TaskState::Failure.as_str()] } }
}

fn status_update(to: TaskState, mut fields: Document) -> Document {
    fields.insert("status", to.as_str());
    fields.insert("updated_at", BsonDateTime::now());
    doc! { "$set": fields }
}

#[async_trait]
impl TaskBackend for MongoTaskBackend {
    async fn insert(&self, record: TaskRecord) -> Result<(), BackendError> {
        self.collection().insert_one(record).await?;
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, BackendError> {
        Ok(self.collection().find_one(doc! { "_id": task_id }).await?)
    }

    async fn mark_processing(&self, task_id: &str) -> Result<(), BackendError> {
        self.transition(task_id, &[TaskState::Pending], TaskState::Processing, Document::new())
            .await
    }

    async fn complete(&self, task_id: &str, payload: serde_json::Value) -> Result<(), BackendError> {
        let result = bson::to_bson(&payload)
            .map_err(|e| BackendError::Encoding(format!("Failed to serialize result: {}", e)))?;

        self.transition(
            task_id,
            &[TaskState::Processing],
            TaskState::Success,
            doc! { "result": result },
        )
        .await
    }

    async fn fail(&self, task_id: &str, error: String, traceback: String) -> Result<(), BackendError> {
        self.transition(
            task_id,
            FAIL_FROM,
            TaskState::Failure,
            doc! { "error": error, "traceback": traceback },
        )
        .await
    }
}
