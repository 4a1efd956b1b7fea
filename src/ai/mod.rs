pub mod extract;
pub mod reviewer;

pub use reviewer::CodeReviewer;

use crate::error::AgentError;
use crate::types::AnalysisResults;
use async_trait::async_trait;

/// Reviews a pull-request diff and reports structured findings.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(
        &self,
        repo_url: &str,
        pr_number: u64,
        diff: &str,
    ) -> Result<AnalysisResults, AgentError>;

    /// Name of this reviewer for logging
    fn name(&self) -> &'static str;
}
