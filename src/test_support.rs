//! In-crate fakes for the model, diff source and reviewer seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::ai::Reviewer;
use crate::error::{AgentError, ExtractError, FetchError, LlmError, MalformedCause};
use crate::github::DiffSource;
use crate::llm::{Message, ModelClient};
use crate::types::{AnalysisResults, AnalysisSummary, FileAnalysis, Issue, IssueType};

/// Model that answers every prompt with the same text and records what it saw.
pub struct CannedModel {
    reply: Option<String>,
    calls: Mutex<Vec<(Option<String>, String)>>,
}

impl CannedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(system prompt, last user message)` for each call so far.
    pub fn calls(&self) -> Vec<(Option<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for CannedModel {
    async fn chat(&self, messages: &[Message], system: Option<&str>) -> Result<String, LlmError> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((system.map(str::to_string), last));

        self.reply.clone().ok_or_else(|| LlmError::Unavailable {
            provider: "canned".to_string(),
        })
    }
}

pub enum FakeDiff {
    Text(String),
    NotFound,
    Unreachable,
    /// Never resolves, keeping the job in `PROCESSING`.
    Hang,
}

pub struct FakeDiffSource {
    behavior: FakeDiff,
    calls: AtomicUsize,
}

impl FakeDiffSource {
    pub fn new(behavior: FakeDiff) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(diff: &str) -> Self {
        Self::new(FakeDiff::Text(diff.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiffSource for FakeDiffSource {
    async fn fetch_pr_diff(
        &self,
        repo_url: &str,
        pr_number: u64,
        _token: Option<&SecretString>,
    ) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        crate::github::parse_repo_url(repo_url)?;

        match &self.behavior {
            FakeDiff::Text(diff) => Ok(diff.clone()),
            FakeDiff::NotFound => Err(FetchError::PullRequestNotFound {
                repo: "acme/widget".to_string(),
                pr_number,
            }),
            FakeDiff::Unreachable => {
                let err = reqwest::Client::new()
                    .get("not a url")
                    .send()
                    .await
                    .unwrap_err();
                Err(FetchError::Network(err))
            }
            FakeDiff::Hang => std::future::pending().await,
        }
    }
}

/// Reviewer returning fixed results, or a malformed-output failure when built
/// with [`FakeReviewer::malformed`].
pub struct FakeReviewer {
    results: Option<AnalysisResults>,
    calls: AtomicUsize,
}

impl FakeReviewer {
    pub fn returning(results: AnalysisResults) -> Self {
        Self {
            results: Some(results),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn malformed() -> Self {
        Self {
            results: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviewer for FakeReviewer {
    async fn review(
        &self,
        _repo_url: &str,
        _pr_number: u64,
        _diff: &str,
    ) -> Result<AnalysisResults, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.results {
            Some(results) => Ok(results.clone()),
            None => {
                let err = serde_json::from_str::<serde_json::Value>("{\"files\": [}").unwrap_err();
                Err(AgentError::MalformedResponse(ExtractError::MalformedModelOutput(
                    MalformedCause::Decode(err),
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "fake_reviewer"
    }
}

/// One bug finding, with a summary that deliberately disagrees with `files`.
pub fn sample_results() -> AnalysisResults {
    AnalysisResults {
        files: vec![FileAnalysis {
            name: "src/widget.rs".to_string(),
            issues: vec![Issue {
                issue_type: IssueType::Bug,
                line: 42,
                description: "Index may be out of bounds".to_string(),
                suggestion: "Use .get() and handle None".to_string(),
            }],
        }],
        summary: AnalysisSummary {
            total_files: 3,
            total_issues: 1,
            critical_issues: 1,
        },
    }
}
