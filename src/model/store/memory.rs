use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId, ElectionStatus},
    db::{Candidate, CandidateOrder, Election, NewCandidate, NewElection, VoteRecord},
};

use super::Store;

#[derive(Debug, Default)]
struct Tables {
    elections: BTreeMap<ElectionId, Election>,
    candidates: BTreeMap<CandidateId, Candidate>,
    ledger: HashSet<VoteRecord>,
    last_election_id: ElectionId,
    last_candidate_id: CandidateId,
}

impl Tables {
    fn next_election_id(&mut self) -> Result<ElectionId> {
        self.last_election_id = self
            .last_election_id
            .checked_add(1)
            .ok_or_else(|| Error::Internal("Election IDs exhausted".to_string()))?;
        Ok(self.last_election_id)
    }

    fn next_candidate_id(&mut self) -> Result<CandidateId> {
        self.last_candidate_id = self
            .last_candidate_id
            .checked_add(1)
            .ok_or_else(|| Error::Internal("Candidate IDs exhausted".to_string()))?;
        Ok(self.last_candidate_id)
    }
}

/// A store that keeps everything in process memory, behind a single lock.
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn open_election(&self, election: NewElection) -> Result<Election> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_election_id()?;
        for existing in tables.elections.values_mut() {
            existing.status = ElectionStatus::Closed;
        }
        let election = election.with_id(id);
        tables.elections.insert(id, election.clone());
        Ok(election)
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.tables.lock().await.elections.get(&id).cloned())
    }

    async fn open_elections(&self) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .filter(|e| e.status == ElectionStatus::Open)
            .cloned()
            .collect())
    }

    async fn closed_elections(&self) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .rev()
            .filter(|e| e.status == ElectionStatus::Closed)
            .cloned()
            .collect())
    }

    async fn close_election(&self, id: ElectionId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.elections.get_mut(&id) {
            Some(election) => {
                election.status = ElectionStatus::Closed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<Election>> {
        let mut tables = self.tables.lock().await;
        let mut closed = Vec::new();
        for election in tables.elections.values_mut() {
            if election.is_expired(now) {
                election.status = ElectionStatus::Closed;
                closed.push(election.clone());
            }
        }
        Ok(closed)
    }

    async fn purge_election(&self, id: ElectionId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.elections.remove(&id).is_none() {
            return Ok(false);
        }
        tables.candidates.retain(|_, c| c.election_id != id);
        tables.ledger.retain(|r| r.election_id != id);
        Ok(true)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_candidate_id()?;
        let candidate = candidate.with_id(id);
        tables.candidates.insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.tables.lock().await.candidates.get(&id).cloned())
    }

    async fn candidates(
        &self,
        election_id: ElectionId,
        order: CandidateOrder,
    ) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<_> = self
            .tables
            .lock()
            .await
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect();
        order.sort(&mut candidates);
        Ok(candidates)
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        name: String,
        photo: Option<String>,
    ) -> Result<Option<Candidate>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.candidates.get_mut(&id).map(|candidate| {
            candidate.name = name;
            if let Some(photo) = photo {
                candidate.photo = photo;
            }
            candidate.clone()
        }))
    }

    async fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
        Ok(self.tables.lock().await.candidates.remove(&id).is_some())
    }

    async fn increment_votes(&self, election_id: ElectionId, id: CandidateId) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.candidates.get_mut(&id) {
            Some(candidate) if candidate.election_id == election_id => {
                candidate.votes = candidate
                    .votes
                    .checked_add(1)
                    .ok_or_else(|| Error::Internal(format!("Vote counter overflow for {id}")))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_vote_record(&self, record: VoteRecord, now: DateTime<Utc>) -> Result<()> {
        let election_id = record.election_id;
        let mut tables = self.tables.lock().await;
        match tables.elections.get(&election_id) {
            Some(election) if election.is_votable(now) => {}
            _ => return Err(Error::ElectionClosed(election_id)),
        }
        if tables.ledger.insert(record) {
            Ok(())
        } else {
            Err(Error::DuplicateVote(election_id))
        }
    }

    async fn has_vote_record(&self, voter: &str, election_id: ElectionId) -> Result<bool> {
        let record = VoteRecord::new(voter, election_id);
        Ok(self.tables.lock().await.ledger.contains(&record))
    }
}
