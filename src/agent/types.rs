use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest {
    pub prompt: String,
    pub idempotent: bool,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
}

// --- Response types ---

/// A freshly created scoping session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Snapshot of a session as returned by the service. Every fetch carries the
/// full message history observed so far.
#[derive(Debug, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub structured_output: Option<serde_json::Value>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub message: String,
}

impl SessionMessage {
    /// Messages we authored (the opening prompt, follow-up instructions) come
    /// back with a user type or an `api` origin; everything else is the agent.
    pub fn is_agent(&self) -> bool {
        let kind = self.kind.to_lowercase();
        let origin = self.origin.to_lowercase();
        !(kind == "initial_user_message" || kind == "user_message" || origin == "api")
    }
}
