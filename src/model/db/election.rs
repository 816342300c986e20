use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{ElectionId, ElectionStatus};

/// An election, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: ElectionId,
    /// Title shown to voters.
    pub title: String,
    /// Stored status. This can lag behind the end time until the sweeper
    /// catches up, so use [`Election::is_votable`] to decide whether votes
    /// are accepted.
    pub status: ElectionStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

impl Election {
    /// Is this election accepting votes at time `now`?
    pub fn is_votable(&self, now: DateTime<Utc>) -> bool {
        self.status == ElectionStatus::Open && now < self.end_time
    }

    /// Is this election still marked open even though its end time has passed?
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ElectionStatus::Open && now >= self.end_time
    }

    /// The election as it stands at `now`: closed if its end time has passed,
    /// whether or not the sweeper has got to it.
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        if self.is_expired(now) {
            self.status = ElectionStatus::Closed;
        }
        self
    }
}

/// The fields of an election supplied by its creator. The store assigns the
/// ID, and new elections always start open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewElection {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl NewElection {
    /// Attach an ID, producing the stored form.
    pub fn with_id(self, id: ElectionId) -> Election {
        Election {
            id,
            title: self.title,
            status: ElectionStatus::Open,
            created_at: self.created_at,
            end_time: self.end_time,
        }
    }
}
