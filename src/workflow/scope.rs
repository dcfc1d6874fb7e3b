use std::time::Duration;

use crate::agent::extract::{self, ScopingResult};
use crate::agent::types::{Session, SessionMessage};
use crate::agent::AgentApi;
use crate::config::ScopeConfig;
use crate::error::{AppError, Result};

use super::types::ScopeOutcome;
use super::MAX_CONSECUTIVE_ERRORS;

/// Lifecycle of one scoping interaction with the agent service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    AwaitingResponse,
    Finalized,
    TimedOut,
    Failed,
}

/// Polling cadence and budget, derived from [`ScopeConfig`].
#[derive(Debug, Clone)]
pub struct ScopeTuning {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub grace_polls: u32,
    pub min_field_markers: usize,
}

impl From<&ScopeConfig> for ScopeTuning {
    fn from(config: &ScopeConfig) -> Self {
        let interval = config.poll_interval_secs.max(1);
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_polls: (config.timeout_secs / interval).max(1) as u32,
            grace_polls: (config.grace_secs / interval) as u32,
            min_field_markers: config.min_field_markers,
        }
    }
}

/// One scoping session against the agent service.
///
/// Drives `Created -> AwaitingResponse -> Finalized`, with `TimedOut` and
/// `Failed` as the terminal disappointments. The remote session stays live
/// whatever happens here; the service has no cancel call.
pub struct ScopingSession<'a> {
    agent: &'a dyn AgentApi,
    tuning: ScopeTuning,
    session: Session,
    baseline: usize,
    state: SessionState,
}

impl<'a> ScopingSession<'a> {
    /// Create the remote session with the issue context as its opening
    /// message, and record the message baseline so only newer entries are
    /// ever considered.
    pub async fn open(
        agent: &'a dyn AgentApi,
        tuning: ScopeTuning,
        prompt: &str,
        title: &str,
    ) -> Result<ScopingSession<'a>> {
        let session = agent.create_session(prompt, title).await?;
        let baseline = agent.list_messages(&session.session_id).await?.len();

        Ok(Self {
            agent,
            tuning,
            session,
            baseline,
            state: SessionState::Created,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Poll until the agent produces a final scoping block, the poll budget
    /// runs out, or an unrecoverable error occurs.
    ///
    /// The newest message satisfying the final-block test wins outright;
    /// earlier candidates are superseded entirely, no field merging.
    pub async fn wait_for_scoping(&mut self) -> Result<ScopeOutcome> {
        self.state = SessionState::AwaitingResponse;

        let mut interim: Vec<String> = Vec::new();
        let mut consecutive_errors: u32 = 0;
        let mut in_grace = false;
        let budget = self.tuning.max_polls + self.tuning.grace_polls;

        for poll in 0..budget {
            if poll >= self.tuning.max_polls && !in_grace {
                if interim.is_empty() {
                    break;
                }
                // The agent is talking but hasn't produced the block yet;
                // a short grace window catches one still streaming in.
                in_grace = true;
                tracing::debug!("Primary window exhausted, entering grace window");
            }

            tokio::time::sleep(self.tuning.poll_interval).await;

            let messages = match self.agent.list_messages(&self.session.session_id).await {
                Ok(messages) => {
                    consecutive_errors = 0;
                    messages
                }
                Err(e @ AppError::Auth(_)) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                        self.state = SessionState::Failed;
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "Message poll failed, will retry");
                    continue;
                }
            };

            let texts = new_agent_texts(&messages, self.baseline);

            for text in texts.iter().rev() {
                if extract::is_final(text, self.tuning.min_field_markers) {
                    self.state = SessionState::Finalized;
                    let result = ScopingResult::parse(text)
                        .unwrap_or_else(|_| ScopingResult::raw_only(text));
                    return Ok(ScopeOutcome::Final(result));
                }
            }

            if !texts.is_empty() {
                interim = texts;
            }
        }

        self.state = SessionState::TimedOut;
        tracing::warn!(
            session_id = %self.session.session_id,
            "No final scoping block within the poll budget"
        );

        if interim.is_empty() {
            Ok(ScopeOutcome::TimedOut)
        } else {
            Ok(ScopeOutcome::Interim(interim))
        }
    }
}

/// Agent-authored message texts that arrived after the baseline.
fn new_agent_texts(messages: &[SessionMessage], baseline: usize) -> Vec<String> {
    messages
        .iter()
        .skip(baseline)
        .filter(|m| m.is_agent() && !m.message.is_empty())
        .map(|m| m.message.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    const FINAL_BLOCK: &str = "\
Current: /health 500s.\nRequested: return 200.\nFiles: src/health.rs\n\
Tests: regression test.\nConfidence: High \u{1F7E2} - small surface";

    enum Step {
        Msgs(Vec<SessionMessage>),
        AuthErr,
        TransportErr,
    }

    /// Scripted agent: call N answers with step N, the last step repeating.
    struct StubAgent {
        steps: Vec<Step>,
        calls: AtomicUsize,
    }

    impl StubAgent {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentApi for StubAgent {
        async fn create_session(&self, _prompt: &str, _title: &str) -> Result<Session> {
            Ok(Session {
                session_id: "ses-1".to_string(),
                url: None,
            })
        }

        async fn send_message(&self, _session_id: &str, _message: &str) -> Result<()> {
            Ok(())
        }

        async fn list_messages(&self, _session_id: &str) -> Result<Vec<SessionMessage>> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.get(i).unwrap_or_else(|| self.steps.last().unwrap());
            match step {
                Step::Msgs(messages) => Ok(messages.clone()),
                Step::AuthErr => Err(AppError::Auth("401".to_string())),
                Step::TransportErr => Err(AppError::Transport("connection reset".to_string())),
            }
        }

        async fn pull_request_status(&self, _session_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn user(text: &str) -> SessionMessage {
        SessionMessage {
            kind: "initial_user_message".to_string(),
            origin: "api".to_string(),
            message: text.to_string(),
        }
    }

    fn agent_msg(text: &str) -> SessionMessage {
        SessionMessage {
            kind: "devin_message".to_string(),
            origin: String::new(),
            message: text.to_string(),
        }
    }

    fn tuning(max_polls: u32, grace_polls: u32) -> ScopeTuning {
        ScopeTuning {
            poll_interval: Duration::ZERO,
            max_polls,
            grace_polls,
            min_field_markers: 5,
        }
    }

    async fn open_session(stub: &StubAgent, tuning: ScopeTuning) -> ScopingSession<'_> {
        ScopingSession::open(stub, tuning, "prompt", "title")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_silent_agent_times_out_after_exact_budget() {
        let stub = StubAgent::new(vec![Step::Msgs(vec![user("prompt")])]);
        let mut session = open_session(&stub, tuning(5, 2)).await;

        let outcome = session.wait_for_scoping().await.unwrap();

        assert!(matches!(outcome, ScopeOutcome::TimedOut));
        assert_eq!(session.state(), SessionState::TimedOut);
        // One baseline fetch plus exactly max_polls waits; no grace window
        // when the agent said nothing at all.
        assert_eq!(stub.calls(), 6);
    }

    #[tokio::test]
    async fn test_final_block_finalizes_and_stops_polling() {
        let stub = StubAgent::new(vec![
            Step::Msgs(vec![user("prompt")]),
            Step::Msgs(vec![user("prompt"), agent_msg("Reading the code...")]),
            Step::Msgs(vec![
                user("prompt"),
                agent_msg("Reading the code..."),
                agent_msg(FINAL_BLOCK),
            ]),
        ]);
        let mut session = open_session(&stub, tuning(10, 0)).await;

        let outcome = session.wait_for_scoping().await.unwrap();

        let ScopeOutcome::Final(result) = outcome else {
            panic!("expected a final scoping block");
        };
        assert_eq!(result.confidence, crate::agent::extract::Confidence::High);
        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test]
    async fn test_latest_final_block_supersedes_earlier_one() {
        let earlier = "Current: a\nRequested: b\nFiles: c.rs\nTests: d\nConfidence: High \u{1F7E2}";
        let later = "Current: x\nRequested: y\nFiles: z.rs\nTests: w\nConfidence: Low \u{1F534} - riskier than it looked";
        let stub = StubAgent::new(vec![
            Step::Msgs(vec![user("prompt")]),
            Step::Msgs(vec![user("prompt"), agent_msg(earlier), agent_msg(later)]),
        ]);
        let mut session = open_session(&stub, tuning(10, 0)).await;

        let ScopeOutcome::Final(result) = session.wait_for_scoping().await.unwrap() else {
            panic!("expected a final scoping block");
        };

        assert_eq!(result.confidence, crate::agent::extract::Confidence::Low);
        assert_eq!(result.files, vec!["z.rs"]);
    }

    #[tokio::test]
    async fn test_interim_output_survives_timeout() {
        let stub = StubAgent::new(vec![
            Step::Msgs(vec![user("prompt")]),
            Step::Msgs(vec![user("prompt"), agent_msg("Cloning the repository...")]),
        ]);
        let mut session = open_session(&stub, tuning(3, 2)).await;

        let outcome = session.wait_for_scoping().await.unwrap();

        let ScopeOutcome::Interim(texts) = outcome else {
            panic!("expected interim output");
        };
        assert_eq!(texts, vec!["Cloning the repository...".to_string()]);
        assert_eq!(session.state(), SessionState::TimedOut);
        // Grace window ran: baseline + max_polls + grace_polls.
        assert_eq!(stub.calls(), 6);
    }

    #[tokio::test]
    async fn test_auth_error_fails_immediately() {
        let stub = StubAgent::new(vec![Step::Msgs(vec![user("prompt")]), Step::AuthErr]);
        let mut session = open_session(&stub, tuning(10, 0)).await;

        let err = session.wait_for_scoping().await.unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_retry_then_fail() {
        let stub = StubAgent::new(vec![Step::Msgs(vec![user("prompt")]), Step::TransportErr]);
        let mut session = open_session(&stub, tuning(20, 0)).await;

        let err = session.wait_for_scoping().await.unwrap_err();

        assert!(matches!(err, AppError::Transport(_)));
        assert_eq!(session.state(), SessionState::Failed);
        // Baseline fetch plus MAX_CONSECUTIVE_ERRORS + 1 failing polls.
        assert_eq!(stub.calls(), 1 + (MAX_CONSECUTIVE_ERRORS as usize) + 1);
    }

    #[test]
    fn test_tuning_from_config() {
        let config = ScopeConfig {
            poll_interval_secs: 3,
            timeout_secs: 120,
            grace_secs: 45,
            min_field_markers: 5,
        };
        let tuning = ScopeTuning::from(&config);
        assert_eq!(tuning.poll_interval, Duration::from_secs(3));
        assert_eq!(tuning.max_polls, 40);
        assert_eq!(tuning.grace_polls, 15);
    }
}
