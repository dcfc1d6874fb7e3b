use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::DevinConfig;
use crate::error::{AppError, Result};

use super::types::{
    CreateSessionRequest, SendMessageRequest, Session, SessionMessage, SessionSnapshot,
};
use super::AgentApi;

/// Pattern for a pull-request link inside free-form agent output.
fn pr_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https://github\.com/[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+/pull/\d+").unwrap()
    })
}

pub struct DevinClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_retries: u32,
}

impl DevinClient {
    pub fn new(config: &DevinConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::Config(
                "devin.api_key is not set (or export ISSUESCOPE__DEVIN__API_KEY)".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Send a request, retrying transient transport failures and 5xx
    /// responses with a linearly growing delay.
    async fn execute_with_retries(&self, request: RequestBuilder) -> Result<Response> {
        let mut attempt: u32 = 0;

        loop {
            let req = request
                .try_clone()
                .ok_or_else(|| AppError::Transport("request is not retryable".to_string()))?;

            match req.send().await {
                Ok(response) => {
                    if response.status().is_server_error() && attempt < self.max_retries {
                        tracing::warn!(status = %response.status(), attempt, "Agent API 5xx, retrying");
                    } else {
                        return self.check_status(response).await;
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(AppError::Transport(e.to_string()));
                    }
                    tracing::warn!(error = %e, attempt, "Agent API request failed, retrying");
                }
            }

            tokio::time::sleep(retry_delay(attempt)).await;
            attempt += 1;
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Auth(format!(
                "Agent API returned {status}: invalid or expired API key"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Service(format!(
                "Agent API returned {status}: {body}"
            )));
        }

        Ok(response)
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let request = self
            .client
            .get(format!("{}/sessions/{session_id}", self.api_base))
            .bearer_auth(&self.api_key);

        let response = self.execute_with_retries(request).await?;
        response
            .json::<SessionSnapshot>()
            .await
            .map_err(|e| AppError::Service(format!("Malformed session payload: {e}")))
    }
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 + u64::from(attempt) * 800)
}

#[async_trait]
impl AgentApi for DevinClient {
    async fn create_session(&self, prompt: &str, title: &str) -> Result<Session> {
        // A timestamp nonce forces a fresh session per scope run.
        let nonce = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let body = CreateSessionRequest {
            prompt: format!("{prompt}\n\n[session_nonce:{nonce}]"),
            idempotent: false,
            title: format!("{title} \u{2022} {nonce}"),
        };

        let request = self
            .client
            .post(format!("{}/sessions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = self.execute_with_retries(request).await?;
        let session = response
            .json::<Session>()
            .await
            .map_err(|e| AppError::Service(format!("Malformed session payload: {e}")))?;

        tracing::info!(session_id = %session.session_id, "Created agent session");
        Ok(session)
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/sessions/{session_id}/message", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&SendMessageRequest {
                message: message.to_string(),
            });

        self.execute_with_retries(request).await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>> {
        Ok(self.get_session(session_id).await?.messages)
    }

    async fn pull_request_status(&self, session_id: &str) -> Result<Option<String>> {
        let snapshot = self.get_session(session_id).await?;

        // The agent is asked to publish the URL in structured output; fall
        // back to scanning message text for a PR link.
        if let Some(url) = snapshot
            .structured_output
            .as_ref()
            .and_then(|so| so["artifacts"]["pr_url"].as_str())
        {
            return Ok(Some(url.to_string()));
        }

        for message in snapshot.messages.iter().rev() {
            if let Some(found) = pr_url_pattern().find(&message.message) {
                return Ok(Some(found.as_str().to_string()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_url_pattern_finds_link_in_prose() {
        let text = "Done! Opened https://github.com/org/repo/pull/9 for review.";
        let found = pr_url_pattern().find(text).unwrap();
        assert_eq!(found.as_str(), "https://github.com/org/repo/pull/9");
    }

    #[test]
    fn test_pr_url_pattern_ignores_non_pr_links() {
        let text = "See https://github.com/org/repo/issues/9 for context.";
        assert!(pr_url_pattern().find(text).is_none());
    }

    #[test]
    fn test_retry_delay_grows() {
        assert!(retry_delay(3) > retry_delay(0));
    }
}
