use serde::{Deserialize, Serialize};

/// An issue as listed or scoped. Read-only within one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub url: String,
}
