use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// A candidate and its running vote count, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: CandidateId,
    /// The election this candidate stands in.
    pub election_id: ElectionId,
    pub name: String,
    /// Opaque photo reference, usually a URL.
    pub photo: String,
    /// Number of counted votes. Only ever incremented.
    pub votes: u64,
}

/// A candidate about to be inserted. The store assigns the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCandidate {
    pub election_id: ElectionId,
    pub name: String,
    pub photo: String,
}

impl NewCandidate {
    /// Attach an ID, producing the stored form with no votes.
    pub fn with_id(self, id: CandidateId) -> Candidate {
        Candidate {
            id,
            election_id: self.election_id,
            name: self.name,
            photo: self.photo,
            votes: 0,
        }
    }
}

/// The order in which to list an election's candidates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CandidateOrder {
    /// Order of insertion, for stable display while voting is in progress.
    Insertion,
    /// Most votes first, ties broken by ascending ID.
    Ranking,
}

impl CandidateOrder {
    /// Sort candidates into this order in place.
    pub fn sort(&self, candidates: &mut [Candidate]) {
        match self {
            Self::Insertion => candidates.sort_by_key(|c| c.id),
            Self::Ranking => {
                candidates.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.id.cmp(&b.id)))
            }
        }
    }
}
