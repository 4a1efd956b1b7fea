use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::types::TaskState;

/// Message stored for any job that could not reach GitHub or the model backend.
pub const NETWORK_ERROR_MESSAGE: &str = "Network Error: Could not connect to GitHub or AI service. \
     Please check your internet connection and try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TaskFailed(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(id) => ApiError::NotFound(format!("Task {} not found", id)),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider unavailable: {provider}")]
    Unavailable { provider: String },
}

impl LlmError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid GitHub repository URL format. Expected 'https://github.com/owner/repo', got '{0}'.")]
    InvalidRepoUrl(String),

    #[error("PR #{pr_number} not found for {repo}")]
    PullRequestNotFound { repo: String, pr_number: u64 },

    #[error("GitHub API error: {0}")]
    RateLimitedOrForbidden(String),

    #[error("GitHub API returned status {status} for {repo}")]
    UpstreamError { status: u16, repo: String },

    #[error("failed to reach GitHub: {0}")]
    Network(#[source] reqwest::Error),
}

/// Why a model answer was rejected. Both causes surface as the same
/// [`ExtractError::MalformedModelOutput`].
#[derive(Debug, Error)]
pub enum MalformedCause {
    #[error("AI returned malformed JSON that could not be parsed. Error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("AI response did not match the expected schema. Error: {0}")]
    Schema(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed model output")]
    MalformedModelOutput(#[source] MalformedCause),
}

impl ExtractError {
    pub fn cause(&self) -> &MalformedCause {
        match self {
            ExtractError::MalformedModelOutput(cause) => cause,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(
        "The AI agent returned a malformed or incomplete response. \
         This can happen under high load. Please try again."
    )]
    MalformedResponse(#[source] ExtractError),

    #[error("model invocation failed: {0}")]
    Model(#[from] LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid task transition from {from} to {to}")]
pub struct TransitionError {
    pub from: TaskState,
    pub to: TaskState,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to encode task record: {0}")]
    Encoding(String),
}

/// Everything a single analysis job can fail with.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No diff content found for the specified PR.")]
    EmptyDiff,

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("failed to serialize analysis results: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// User-message bucket a failed job falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Validation,
    Unexpected,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Fetch(FetchError::Network(_)) => FailureKind::Network,
            JobError::Agent(AgentError::Model(e)) if e.is_network() => FailureKind::Network,
            JobError::Fetch(FetchError::InvalidRepoUrl(_))
            | JobError::EmptyDiff
            | JobError::Agent(AgentError::MalformedResponse(_)) => FailureKind::Validation,
            _ => FailureKind::Unexpected,
        }
    }

    /// Short, non-technical text stored on the task record and shown to callers.
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::Network => NETWORK_ERROR_MESSAGE.to_string(),
            FailureKind::Validation => self.to_string(),
            FailureKind::Unexpected => format!("An unexpected error occurred: {}", self),
        }
    }

    /// Operator-facing trace: the debug form plus the whole `source()` chain.
    pub fn diagnostics(&self) -> String {
        let mut trace = format!("{:?}", self);
        let mut source = std::error::Error::source(self);
        let mut depth = 0;
        while let Some(cause) = source {
            trace.push_str(&format!("\n  caused by [{}]: {}", depth, cause));
            source = cause.source();
            depth += 1;
        }
        trace
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingRequired(String),

    #[error("invalid value for {0}")]
    InvalidValue(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "TASK_NOT_READY",
            ApiError::TaskFailed(_) => "TASK_FAILED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        })
    }
}
