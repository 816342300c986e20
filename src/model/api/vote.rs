use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// A voter's ballot: one candidate in one election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteRequest {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
}

/// Confirmation that a vote was recorded and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteReceipt {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
}
