use std::io::{self, Write};
use std::time::Duration;

use crate::agent::AgentApi;
use crate::config::PrConfig;
use crate::error::{AppError, Result};

use super::types::PrOutcome;
use super::MAX_CONSECUTIVE_ERRORS;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Polling cadence and budget, derived from [`PrConfig`].
#[derive(Debug, Clone)]
pub struct PrTuning {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl From<&PrConfig> for PrTuning {
    fn from(config: &PrConfig) -> Self {
        let interval = config.poll_interval_secs.max(1);
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_polls: (config.timeout_secs / interval).max(1) as u32,
        }
    }
}

/// Watches an agent session until it reports a pull request.
pub struct PullRequestPoller<'a> {
    agent: &'a dyn AgentApi,
    tuning: PrTuning,
    show_progress: bool,
}

impl<'a> PullRequestPoller<'a> {
    pub fn new(agent: &'a dyn AgentApi, tuning: PrTuning) -> Self {
        Self {
            agent,
            tuning,
            show_progress: true,
        }
    }

    /// Suppress the spinner, e.g. when output is piped.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Poll until a PR reference appears or the budget runs out. Timing out
    /// is a soft outcome: the agent may still open the PR later.
    pub async fn wait_for_pr(&self, session_id: &str) -> Result<PrOutcome> {
        let mut consecutive_errors: u32 = 0;

        for poll in 0..self.tuning.max_polls {
            tokio::time::sleep(self.tuning.poll_interval).await;

            match self.agent.pull_request_status(session_id).await {
                Ok(Some(url)) => {
                    self.clear_progress();
                    tracing::info!(url = %url, "Pull request detected");
                    return Ok(PrOutcome::Found(url));
                }
                Ok(None) => {
                    consecutive_errors = 0;
                    self.render_progress(poll);
                }
                Err(e @ AppError::Auth(_)) => {
                    self.clear_progress();
                    return Err(e);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                        self.clear_progress();
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "PR status poll failed, will retry");
                }
            }
        }

        self.clear_progress();
        Ok(PrOutcome::TimedOut)
    }

    fn render_progress(&self, poll: u32) {
        if !self.show_progress {
            return;
        }
        let frame = SPINNER_FRAMES[poll as usize % SPINNER_FRAMES.len()];
        eprint!("\r{frame}  polling agent for PR...");
        let _ = io::stderr().flush();
    }

    fn clear_progress(&self) {
        if !self.show_progress {
            return;
        }
        eprint!("\r{:width$}\r", "", width = 40);
        let _ = io::stderr().flush();
    }
}
