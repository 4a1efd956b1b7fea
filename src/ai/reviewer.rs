use std::sync::Arc;

use crate::ai::extract::parse_analysis;
use crate::ai::Reviewer;
use crate::config::DEFAULT_MAX_DIFF_CHARS;
use crate::error::AgentError;
use crate::llm::{Message, ModelClient};
use crate::types::AnalysisResults;
use async_trait::async_trait;

const TRUNCATION_MARKER: &str = "\n... (diff truncated) ...";

const REVIEWER_SYSTEM: &str = "You are a Senior Code Quality Reviewer. \
    Your goal is to analyze GitHub pull request diffs to find bugs, style issues, \
    performance bottlenecks, and best practice violations. \
    You have a keen eye for detail and a deep understanding of software engineering principles. \
    Provide constructive, actionable feedback in a structured JSON format, \
    and identify the specific file and line number for every issue. \
    Respond with a single, valid JSON object containing the analysis.";

const RESULT_SCHEMA: &str = r#"{
  "files": [
    {
      "name": "path/to/file.py",
      "issues": [
        {
          "type": "bug" | "style" | "performance" | "best_practice",
          "line": 123,
          "description": "A description of the issue.",
          "suggestion": "A suggestion to fix the issue."
        }
      ]
    }
  ],
  "summary": {
    "total_files": 1,
    "total_issues": 1,
    "critical_issues": 0
  }
}"#;

const EMPTY_ANSWER: &str =
    r#"{"files": [], "summary": {"total_files": 0, "total_issues": 0, "critical_issues": 0}}"#;

/// LLM-backed reviewer: one prompt per diff, one model call.
pub struct CodeReviewer {
    client: Arc<dyn ModelClient>,
    max_diff_chars: usize,
}

impl CodeReviewer {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            max_diff_chars: DEFAULT_MAX_DIFF_CHARS,
        }
    }

    pub fn with_max_diff_chars(mut self, max_diff_chars: usize) -> Self {
        self.max_diff_chars = max_diff_chars;
        self
    }

    /// Cuts the diff to `max_diff_chars` characters, marking the cut.
    pub fn truncate_diff(&self, diff: &str) -> String {
        match diff.char_indices().nth(self.max_diff_chars) {
            Some((byte_idx, _)) => format!("{}{}", &diff[..byte_idx], TRUNCATION_MARKER),
            None => diff.to_string(),
        }
    }

    pub fn build_prompt(&self, repo_url: &str, pr_number: u64, diff: &str) -> String {
        format!(
            "Review the code diff below for PR #{} from {}.\n\
             Identify bugs, style issues, performance issues, and best practices.\n\n\
             Code Diff:\n\
             ---\n\
             {}\n\
             ---\n\n\
             You MUST return your analysis in this EXACT JSON format.\n\
             Pay close attention to the field names (\"name\", \"type\", \"line\", \"suggestion\").\n\n\
             SCHEMA:\n\
             {}\n\n\
             If no issues are found, return:\n\
             {}",
            pr_number,
            repo_url,
            self.truncate_diff(diff),
            RESULT_SCHEMA,
            EMPTY_ANSWER
        )
    }
}

#[async_trait]
impl Reviewer for CodeReviewer {
    async fn review(
        &self,
        repo_url: &str,
        pr_number: u64,
        diff: &str,
    ) -> Result<AnalysisResults, AgentError> {
        let prompt = self.build_prompt(repo_url, pr_number, diff);

        let messages = vec![Message::user(prompt)];
        let raw_output = self.client.chat(&messages, Some(REVIEWER_SYSTEM)).await?;

        parse_analysis(&raw_output).map_err(|e| {
            tracing::warn!("Rejected model output: {}", e.cause());
            AgentError::MalformedResponse(e)
        })
    }

    fn name(&self) -> &'static str {
        "code_reviewer"
    }
}
