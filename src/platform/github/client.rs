use async_trait::async_trait;
use octocrab::Octocrab;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::Issue;
use crate::platform::IssueSource;

use super::mapper;

pub struct GitHubIssues {
    client: Octocrab,
}

impl GitHubIssues {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();

        // Anonymous access works for public repos; a token is needed for
        // private ones and for decent rate limits.
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }

        let client = builder
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self { client })
    }

    fn parse_repo(repo_full_name: &str) -> Result<(&str, &str)> {
        let parts: Vec<&str> = repo_full_name.splitn(2, '/').collect();
        if parts.len() != 2 {
            return Err(AppError::GitHubApi(format!(
                "Invalid repo name: {repo_full_name}"
            )));
        }
        Ok((parts[0], parts[1]))
    }
}

#[async_trait]
impl IssueSource for GitHubIssues {
    async fn list_open_issues(&self, repo_full_name: &str) -> Result<Vec<Issue>> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let page = self
            .client
            .issues(owner, repo)
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;

        // The issues endpoint interleaves pull requests; drop them.
        Ok(page
            .items
            .iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(mapper::map_issue)
            .collect())
    }

    async fn get_issue(&self, repo_full_name: &str, issue_number: u64) -> Result<Issue> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let issue = self
            .client
            .issues(owner, repo)
            .get(issue_number)
            .await
            .map_err(|e| {
                AppError::GitHubApi(format!(
                    "Failed to fetch issue #{issue_number} in {repo_full_name}: {e}"
                ))
            })?;

        Ok(mapper::map_issue(&issue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo() {
        assert_eq!(
            GitHubIssues::parse_repo("octocat/hello").unwrap(),
            ("octocat", "hello")
        );
        assert!(GitHubIssues::parse_repo("no-slash").is_err());
    }
}
