pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::Issue;

#[async_trait]
pub trait IssueSource: Send + Sync {
    /// List open issues in a repository, pull requests excluded.
    async fn list_open_issues(&self, repo_full_name: &str) -> Result<Vec<Issue>>;

    /// Fetch a single issue.
    async fn get_issue(&self, repo_full_name: &str, issue_number: u64) -> Result<Issue>;
}
