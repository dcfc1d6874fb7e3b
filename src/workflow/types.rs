use crate::agent::extract::ScopingResult;

/// How the scoping wait ended.
#[derive(Debug)]
pub enum ScopeOutcome {
    /// A final scoping block arrived and parsed.
    Final(ScopingResult),
    /// Only interim output arrived before the deadline; raw texts, oldest first.
    Interim(Vec<String>),
    /// Nothing agent-authored arrived at all.
    TimedOut,
}

/// How the pull-request wait ended.
#[derive(Debug, PartialEq, Eq)]
pub enum PrOutcome {
    Found(String),
    /// Soft outcome: the agent may still open the PR after we stop watching.
    TimedOut,
}
