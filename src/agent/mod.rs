pub mod devin;
pub mod extract;
pub mod prompt;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{Session, SessionMessage};

/// Operations the scoping workflow needs from the coding-agent service.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Create a session with `prompt` as its opening message.
    async fn create_session(&self, prompt: &str, title: &str) -> Result<Session>;

    /// Post a follow-up message into an existing session.
    async fn send_message(&self, session_id: &str, message: &str) -> Result<()>;

    /// Fetch the full message history observed so far. Callers detect new
    /// entries by index against a previously recorded baseline length.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>>;

    /// Whether the session has produced a pull request yet. A single
    /// request/response; never blocks waiting for one.
    async fn pull_request_status(&self, session_id: &str) -> Result<Option<String>>;
}
