use actix_web::{web, Responder};

use crate::error::ApiError;
use crate::tasks::TaskQueue;
use crate::types::{AnalysisRequest, AnalysisResults, FinalTaskResult, TaskRecord, TaskState, TaskStatusResponse};

const UNKNOWN_ERROR: &str = "Unknown error";

pub async fn health() -> impl Responder {
    web::Json(serde_json::json!({"status": "ok"}))
}

pub async fn analyze_pr(
    body: web::Json<AnalysisRequest>,
    queue: web::Data<TaskQueue>,
) -> Result<impl Responder, ApiError> {
    let request = body.into_inner();

    if request.repo_url.trim().is_empty() {
        return Err(ApiError::BadRequest("repo_url is required".to_string()));
    }

    tracing::info!(
        "Received analysis request for {}/pull/{}",
        request.repo_url,
        request.pr_number
    );

    let response = queue.submit(request).await?;
    Ok(web::Json(response))
}

pub async fn get_status(
    path: web::Path<String>,
    queue: web::Data<TaskQueue>,
) -> Result<impl Responder, ApiError> {
    let task_id = path.into_inner();
    let record = find_task(&queue, &task_id).await?;

    let message = match record.status {
        TaskState::Pending => "Task is waiting in the queue.".to_string(),
        TaskState::Processing => "Task is currently being processed by a worker.".to_string(),
        TaskState::Success => "Task completed successfully.".to_string(),
        TaskState::Failure => format!("Task failed: {}", record.error.as_deref().unwrap_or(UNKNOWN_ERROR)),
    };

    Ok(web::Json(TaskStatusResponse {
        task_id,
        status: record.status,
        message,
    }))
}

pub async fn get_results(
    path: web::Path<String>,
    queue: web::Data<TaskQueue>,
) -> Result<impl Responder, ApiError> {
    let task_id = path.into_inner();
    let record = find_task(&queue, &task_id).await?;

    match record.status {
        TaskState::Pending | TaskState::Processing => Err(ApiError::Conflict(format!(
            "Task {} is still {}. Use /status/{} to monitor.",
            task_id, record.status, task_id
        ))),
        TaskState::Failure => Err(ApiError::TaskFailed(format!(
            "Task {} failed. Error: {}",
            task_id,
            record.error.as_deref().unwrap_or(UNKNOWN_ERROR)
        ))),
        TaskState::Success => {
            let payload = record.result.ok_or_else(|| {
                ApiError::InternalError(format!("Task {} succeeded without a result", task_id))
            })?;
            let results: AnalysisResults = serde_json::from_value(payload).map_err(|e| {
                tracing::error!(task_id = %task_id, "Stored result failed validation: {}", e);
                ApiError::InternalError(format!("Result schema validation failed: {}", e))
            })?;

            Ok(web::Json(FinalTaskResult {
                task_id,
                status: "completed".to_string(),
                results,
            }))
        }
    }
}

async fn find_task(queue: &TaskQueue, task_id: &str) -> Result<TaskRecord, ApiError> {
    queue
        .get(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/analyze-pr", web::post().to(analyze_pr))
        .route("/status/{task_id}", web::get().to(get_status))
        .route("/results/{task_id}", web::get().to(get_results));
}
