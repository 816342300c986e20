//! Persistence for the three election tables: elections, candidates, and the
//! vote ledger.
//!
//! Every method is individually atomic. Methods that touch several records
//! ([`Store::open_election`], [`Store::purge_election`]) are atomic as a unit.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::election::{CandidateId, ElectionId},
    db::{Candidate, CandidateOrder, Election, NewCandidate, NewElection, VoteRecord},
};

mod memory;
pub use memory::MemoryStore;

#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Elections

    /// Close every open election and insert `election` as the only open one.
    async fn open_election(&self, election: NewElection) -> Result<Election>;

    async fn election(&self, id: ElectionId) -> Result<Option<Election>>;

    /// Elections whose stored status is open, regardless of end time.
    async fn open_elections(&self) -> Result<Vec<Election>>;

    /// Closed elections, newest first.
    async fn closed_elections(&self) -> Result<Vec<Election>>;

    /// Mark the election closed. Returns false iff it doesn't exist.
    async fn close_election(&self, id: ElectionId) -> Result<bool>;

    /// Close every open election whose end time is at or before `now`,
    /// returning the elections that this call closed.
    async fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<Election>>;

    /// Delete the election with its candidates and vote records.
    /// Returns false iff it doesn't exist.
    async fn purge_election(&self, id: ElectionId) -> Result<bool>;

    // Candidates

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>>;

    async fn candidates(
        &self,
        election_id: ElectionId,
        order: CandidateOrder,
    ) -> Result<Vec<Candidate>>;

    /// Rename a candidate, replacing the photo too if one is given.
    /// Returns the updated candidate, or `None` if it doesn't exist.
    async fn update_candidate(
        &self,
        id: CandidateId,
        name: String,
        photo: Option<String>,
    ) -> Result<Option<Candidate>>;

    /// Returns false iff the candidate doesn't exist.
    async fn delete_candidate(&self, id: CandidateId) -> Result<bool>;

    /// Add exactly one vote to the candidate. Returns false iff there is no
    /// such candidate in the given election.
    async fn increment_votes(&self, election_id: ElectionId, id: CandidateId) -> Result<bool>;

    // Vote ledger

    /// Insert the record, failing with [`crate::error::Error::DuplicateVote`]
    /// if the (voter, election) pair is already present.
    ///
    /// The election must be votable at `now`, checked atomically with the
    /// insert; otherwise this fails with [`crate::error::Error::ElectionClosed`]
    /// and nothing is written.
    async fn insert_vote_record(&self, record: VoteRecord, now: DateTime<Utc>) -> Result<()>;

    async fn has_vote_record(&self, voter: &str, election_id: ElectionId) -> Result<bool>;
}
