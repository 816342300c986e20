use serde::{Deserialize, Serialize};

use crate::model::common::election::ElectionId;

/// Proof that `voter` has voted in `election_id`. The pair is unique; the
/// record says nothing about who was voted for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter: String,
    pub election_id: ElectionId,
}

impl VoteRecord {
    pub fn new(voter: impl Into<String>, election_id: ElectionId) -> Self {
        Self {
            voter: voter.into(),
            election_id,
        }
    }
}
