use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId},
    db::{Candidate, CandidateOrder, NewCandidate},
    store::Store,
};

use super::{Admin, Registry};

/// Holds the candidates of every election and their vote counters.
#[derive(Clone)]
pub struct Tally {
    store: Arc<dyn Store>,
    registry: Registry,
}

impl Tally {
    pub fn new(store: Arc<dyn Store>, registry: Registry) -> Self {
        Self { store, registry }
    }

    /// Add a candidate to an election that is currently accepting votes.
    /// Without a photo, a generated avatar is used.
    pub async fn add_candidate(
        &self,
        _admin: &Admin,
        election_id: ElectionId,
        name: &str,
        photo: Option<String>,
    ) -> Result<Candidate> {
        let name = validate_name(name)?;
        let election = self.registry.get_election(election_id).await?;
        if !election.is_votable(self.registry.now()) {
            return Err(Error::ElectionNotOpen(election_id));
        }

        let photo = photo
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| avatar_url(&name));
        let candidate = self
            .store
            .insert_candidate(NewCandidate {
                election_id,
                name,
                photo,
            })
            .await?;
        info!(
            "Added candidate {} \"{}\" to election {election_id}",
            candidate.id, candidate.name
        );
        Ok(candidate)
    }

    /// Rename a candidate, and replace its photo if a new one is given.
    pub async fn rename_candidate(
        &self,
        _admin: &Admin,
        id: CandidateId,
        name: &str,
        photo: Option<String>,
    ) -> Result<Candidate> {
        let name = validate_name(name)?;
        let photo = photo.filter(|p| !p.trim().is_empty());
        self.store
            .update_candidate(id, name, photo)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    pub async fn delete_candidate(&self, _admin: &Admin, id: CandidateId) -> Result<()> {
        if !self.store.delete_candidate(id).await? {
            return Err(Error::not_found(format!("Candidate {id}")));
        }
        info!("Deleted candidate {id}");
        Ok(())
    }

    pub async fn get_candidate(&self, id: CandidateId) -> Result<Candidate> {
        self.store
            .candidate(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    /// Add exactly one vote to the candidate.
    pub async fn increment_vote(&self, election_id: ElectionId, id: CandidateId) -> Result<()> {
        if self.store.increment_votes(election_id, id).await? {
            Ok(())
        } else {
            Err(Error::not_found(format!(
                "Candidate {id} in election {election_id}"
            )))
        }
    }

    /// The election's candidates: in insertion order while it is accepting
    /// votes, ranked by votes once it is over.
    pub async fn list_candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        let election = self.registry.get_election(election_id).await?;
        let order = if election.is_votable(self.registry.now()) {
            CandidateOrder::Insertion
        } else {
            CandidateOrder::Ranking
        };
        self.store.candidates(election_id, order).await
    }

    pub async fn list_candidates_ordered(
        &self,
        election_id: ElectionId,
        order: CandidateOrder,
    ) -> Result<Vec<Candidate>> {
        self.registry.get_election(election_id).await?;
        self.store.candidates(election_id, order).await
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Candidate name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// A generated avatar for candidates without a photo.
fn avatar_url(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("https://ui-avatars.com/api/?name={encoded}&background=random")
}
