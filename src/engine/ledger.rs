use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{common::election::ElectionId, db::VoteRecord, store::Store};

/// Records which identities have voted in which elections. Its uniqueness
/// constraint is the only thing that decides "already voted".
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn has_voted(&self, identity: &str, election_id: ElectionId) -> Result<bool> {
        self.store.has_vote_record(identity, election_id).await
    }

    /// Record that `identity` has voted in the election, failing with
    /// [`Error::DuplicateVote`] if it already had, or with
    /// [`Error::ElectionClosed`] if the election isn't votable at `now`.
    ///
    /// Checking [`Ledger::has_voted`] first is not enough to prevent double
    /// votes, since another request can record in between; callers must rely
    /// on this method's result instead.
    pub async fn record_vote(
        &self,
        identity: &str,
        election_id: ElectionId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if identity.trim().is_empty() {
            return Err(Error::InvalidInput("Voter identity is missing".to_string()));
        }
        self.store
            .insert_vote_record(VoteRecord::new(identity, election_id), now)
            .await
    }
}
