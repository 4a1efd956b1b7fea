use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;

// ============================================================================
// ANALYSIS TYPES
// ============================================================================

/// Body of `POST /analyze-pr`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub repo_url: String,
    pub pr_number: u64,
    /// Overrides the server-wide GitHub token for this request only.
    #[serde(default)]
    pub github_token: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Style,
    Performance,
    BestPractice,
}

/// Single finding reported by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub line: i64,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub name: String,
    pub issues: Vec<Issue>,
}

/// Counts as reported by the model. They are never recomputed from `files`,
/// so nothing guarantees they agree with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_files: u64,
    pub total_issues: u64,
    pub critical_issues: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub files: Vec<FileAnalysis>,
    pub summary: AnalysisSummary,
}

impl AnalysisResults {
    /// The "model found nothing" answer.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ============================================================================
// TASK TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Processing,
    Success,
    Failure,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Processing => "PROCESSING",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state of one analysis job, keyed by `task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "_id")]
    pub task_id: String,
    pub status: TaskState,
    pub repo_url: String,
    pub pr_number: u64,
    /// Serialized [`AnalysisResults`], present once `SUCCESS`.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// States a task may fail from.
pub const FAIL_FROM: &[TaskState] = &[TaskState::Pending, TaskState::Processing];

impl TaskRecord {
    pub fn new(task_id: String, repo_url: String, pr_number: u64) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskState::Pending,
            repo_url,
            pr_number,
            result: None,
            error: None,
            traceback: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, allowed_from: &[TaskState], to: TaskState) -> Result<(), TransitionError> {
        if !allowed_from.contains(&self.status) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `PENDING -> PROCESSING`; happens at most once.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(&[TaskState::Pending], TaskState::Processing)
    }

    /// `PROCESSING -> SUCCESS`
    pub fn succeed(&mut self, payload: serde_json::Value) -> Result<(), TransitionError> {
        self.transition(&[TaskState::Processing], TaskState::Success)?;
        self.result = Some(payload);
        Ok(())
    }

    /// `PROCESSING -> FAILURE`, or `PENDING -> FAILURE` when the job could
    /// not be started.
    pub fn fail(&mut self, error: String, traceback: String) -> Result<(), TransitionError> {
        self.transition(FAIL_FROM, TaskState::Failure)?;
        self.error = Some(error);
        self.traceback = Some(traceback);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// API Responses
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskState,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTaskResult {
    pub task_id: String,
    pub status: String,
    pub results: AnalysisResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_serialization() {
        let json = serde_json::to_string(&TaskState::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let state: TaskState = serde_json::from_str("\"FAILURE\"").unwrap();
        assert_eq!(state, TaskState::Failure);
        assert_eq!(TaskState::Success.to_string(), "SUCCESS");
    }

    #[test]
    fn test_issue_uses_type_field() {
        let issue: Issue = serde_json::from_str(
            r#"{"type": "best_practice", "line": 12, "description": "d", "suggestion": "s"}"#,
        )
        .unwrap();
        assert_eq!(issue.issue_type, IssueType::BestPractice);

        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"type\":\"best_practice\""));
    }

    #[test]
    fn test_issue_rejects_unknown_type() {
        let result = serde_json::from_str::<Issue>(
            r#"{"type": "critical", "line": 1, "description": "d", "suggestion": "s"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_results_shape() {
        let json = serde_json::to_value(AnalysisResults::empty()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "files": [],
                "summary": {"total_files": 0, "total_issues": 0, "critical_issues": 0}
            })
        );
    }

    #[test]
    fn test_request_token_is_optional() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"repo_url": "https://github.com/acme/widget", "pr_number": 42}"#)
                .unwrap();
        assert_eq!(request.pr_number, 42);
        assert!(request.github_token.is_none());
    }

    #[test]
    fn test_record_lifecycle() {
        let mut record = TaskRecord::new("t1".to_string(), "https://github.com/a/b".to_string(), 1);
        assert_eq!(record.status, TaskState::Pending);

        record.start().unwrap();
        assert_eq!(record.status, TaskState::Processing);

        record.succeed(serde_json::json!({"files": []})).unwrap();
        assert_eq!(record.status, TaskState::Success);
        assert!(record.result.is_some());
    }

    #[test]
    fn test_processing_entered_once() {
        let mut record = TaskRecord::new("t1".to_string(), "u".to_string(), 1);
        record.start().unwrap();
        let err = record.start().unwrap_err();
        assert_eq!(err.from, TaskState::Processing);
        assert_eq!(err.to, TaskState::Processing);
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut record = TaskRecord::new("t1".to_string(), "u".to_string(), 1);
        record.start().unwrap();
        record.fail("boom".to_string(), "trace".to_string()).unwrap();

        assert!(record.succeed(serde_json::json!({})).is_err());
        assert!(record.fail("again".to_string(), String::new()).is_err());
        assert!(record.start().is_err());
        assert_eq!(record.status, TaskState::Failure);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(record.result.is_none());
    }

    #[test]
    fn test_cannot_finish_without_processing() {
        let mut record = TaskRecord::new("t1".to_string(), "u".to_string(), 1);
        assert!(record.succeed(serde_json::json!({})).is_err());
        assert_eq!(record.status, TaskState::Pending);
    }

    #[test]
    fn test_pending_task_can_fail_without_starting() {
        let mut record = TaskRecord::new("t1".to_string(), "u".to_string(), 1);
        record.fail("store down".to_string(), "trace".to_string()).unwrap();

        assert_eq!(record.status, TaskState::Failure);
        assert!(record.start().is_err());
        assert!(record.succeed(serde_json::json!({})).is_err());
    }
}
