use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectionStatus {
    /// Accepting votes until the end time passes.
    Open,
    /// Finished, either explicitly or by expiry. Results are final.
    Closed,
}

impl ElectionStatus {
    /// The name this status is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
        }
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}
