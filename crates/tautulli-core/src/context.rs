//! Origin marker for state writes and service calls

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Ties a state write or service call to the action that caused it
///
/// The id is a ULID, so ids created later sort after earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
