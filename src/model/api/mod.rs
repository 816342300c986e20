//! API-friendly types, received from or sent to clients as JSON.

use serde::{Deserialize, Serialize};

pub mod admin;
pub mod candidate;
pub mod election;
pub mod vote;

/// A human-readable outcome, e.g. "Vote confirmed" or the reason for a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
