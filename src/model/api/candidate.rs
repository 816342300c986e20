use serde::{Deserialize, Serialize};

use crate::model::common::election::ElectionId;

/// An admin's request to add a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CandidateSpec {
    pub name: String,
    /// Photo reference. A generated avatar is used if absent.
    #[serde(default)]
    pub photo: Option<String>,
    /// Target election; defaults to the currently open one.
    #[serde(default)]
    pub election_id: Option<ElectionId>,
}

/// An admin's edit of an existing candidate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CandidateUpdate {
    pub name: String,
    /// Replacement photo reference; the old photo is kept if absent.
    #[serde(default)]
    pub photo: Option<String>,
}
