use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionId, ElectionStatus},
    db::{Candidate, Election},
};

/// An admin's request to start a new election cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ElectionSpec {
    pub title: String,
    /// Duration in minutes, possibly fractional. Falls back to the configured
    /// default duration if absent.
    #[serde(default)]
    pub minutes: Option<f64>,
}

/// An API-friendly election description, with plain ISO-8601 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionView {
    pub id: ElectionId,
    pub title: String,
    pub status: ElectionStatus,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Election> for ElectionView {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.title,
            status: election.status,
            created_at: election.created_at,
            end_time: election.end_time,
        }
    }
}

/// An election together with its candidates, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    pub election: ElectionView,
    pub candidates: Vec<Candidate>,
}

impl ElectionDetail {
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Self {
        Self {
            election: election.into(),
            candidates,
        }
    }
}

/// What the public voting page polls for: the open election, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveElection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub election: Option<ElectionDetail>,
}

impl From<Option<ElectionDetail>> for ActiveElection {
    fn from(election: Option<ElectionDetail>) -> Self {
        Self {
            active: election.is_some(),
            election,
        }
    }
}

/// Everything the admin page shows at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub active: Option<ElectionDetail>,
    pub history: Vec<ElectionView>,
}
