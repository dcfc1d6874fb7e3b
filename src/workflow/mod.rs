pub mod issue;
pub mod pr;
pub mod scope;
pub mod types;

/// Consecutive poll failures tolerated before a wait is abandoned.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;
