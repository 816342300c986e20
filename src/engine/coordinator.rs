use crate::error::{Error, Result};
use crate::logging::ANOMALY_TARGET;
use crate::model::{
    api::vote::VoteReceipt,
    common::election::{CandidateId, ElectionId},
};

use super::{Ledger, Registry, Tally};

/// Runs a single vote across the registry, ledger and tally.
///
/// The ledger write comes first and acts as the gate: of several concurrent
/// votes by one identity, exactly one gets past it, and only that one touches
/// a counter.
#[derive(Clone)]
pub struct Coordinator {
    registry: Registry,
    ledger: Ledger,
    tally: Tally,
}

impl Coordinator {
    pub fn new(registry: Registry, ledger: Ledger, tally: Tally) -> Self {
        Self {
            registry,
            ledger,
            tally,
        }
    }

    pub async fn cast_vote(
        &self,
        identity: &str,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<VoteReceipt> {
        self.registry.votable_election(election_id).await?;

        // Catch the common mistake of an unknown or foreign candidate before
        // anything is written, so the voter can try again.
        let candidate = self.tally.get_candidate(candidate_id).await?;
        if candidate.election_id != election_id {
            return Err(Error::not_found(format!(
                "Candidate {candidate_id} in election {election_id}"
            )));
        }

        // The ledger re-checks votability atomically with the write, so a
        // close or purge since the check above cannot leave a stray record.
        let now = self.registry.now();
        match self.ledger.record_vote(identity, election_id, now).await {
            Ok(()) => {}
            Err(Error::DuplicateVote(id)) => {
                debug!("Rejected repeat vote by {identity} in election {id}");
                return Err(Error::AlreadyVoted(id));
            }
            Err(e) => return Err(e),
        }

        // From here on the vote is recorded, so a failure means it is lost.
        if let Err(e) = self.tally.increment_vote(election_id, candidate_id).await {
            // A purge in the meantime removed the record along with the
            // election, so nothing is left half done.
            if let Err(Error::NotFound(_)) = self.registry.get_election(election_id).await {
                warn!(
                    "Election {election_id} was deleted while a vote by {identity} was in flight"
                );
                return Err(Error::ElectionClosed(election_id));
            }
            log::error!(
                target: ANOMALY_TARGET,
                "Vote by {identity} in election {election_id} was recorded but NOT counted \
for candidate {candidate_id}: {e}"
            );
            return Err(Error::Internal(format!(
                "Vote in election {election_id} was recorded but could not be counted"
            )));
        }

        debug!("Counted vote in election {election_id} for candidate {candidate_id}");
        Ok(VoteReceipt {
            election_id,
            candidate_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use crate::clock::{Clock, ManualClock};
    use crate::engine::{Admin, Engine};
    use crate::model::{
        common::election::ElectionStatus,
        db::{Candidate, CandidateOrder, Election, NewCandidate, NewElection, VoteRecord},
        store::{MemoryStore, Store},
    };

    fn admin() -> Admin {
        Admin::authorize(true).unwrap()
    }

    /// Open a one-minute election with candidates A and B.
    async fn board_vote(engine: &Engine) -> (ElectionId, CandidateId, CandidateId) {
        let election = engine
            .registry()
            .open_new_election(&admin(), "Board Vote", 1.0)
            .await
            .unwrap();
        let tally = engine.tally();
        let a = tally.add_candidate(&admin(), election.id, "A", None).await.unwrap();
        let b = tally.add_candidate(&admin(), election.id, "B", None).await.unwrap();
        (election.id, a.id, b.id)
    }

    async fn votes(engine: &Engine, id: CandidateId) -> u64 {
        engine.tally().get_candidate(id).await.unwrap().votes
    }

    #[backend_test]
    async fn board_vote_scenario(engine: Engine, clock: ManualClock) {
        let (election, a, b) = board_vote(&engine).await;
        let coordinator = engine.coordinator();

        let receipt = coordinator.cast_vote("x1", election, a).await.unwrap();
        assert_eq!(receipt.candidate_id, a);
        assert_eq!(votes(&engine, a).await, 1);

        let err = coordinator.cast_vote("x1", election, b).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted(id) if id == election));
        assert_eq!(votes(&engine, b).await, 0);

        coordinator.cast_vote("x2", election, b).await.unwrap();
        assert_eq!(votes(&engine, b).await, 1);

        clock.advance(Duration::seconds(61));
        for (voter, candidate) in [("x1", a), ("x3", a), ("x4", b)] {
            let err = coordinator
                .cast_vote(voter, election, candidate)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ElectionClosed(_)));
        }

        // A tie, broken by ascending ID.
        let ranked: Vec<_> = engine
            .tally()
            .list_candidates(election)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.id, c.votes))
            .collect();
        assert_eq!(ranked, vec![(a, 1), (b, 1)]);
    }

    /// Race `attempts` votes by one identity, alternating candidates.
    async fn race_one_identity(engine: &Engine, attempts: usize) {
        let (election, a, b) = board_vote(engine).await;
        let coordinator = engine.coordinator().clone();

        let handles: Vec<_> = (0..attempts)
            .map(|i| {
                let coordinator = coordinator.clone();
                let candidate = if i % 2 == 0 { a } else { b };
                rocket::tokio::spawn(async move {
                    coordinator.cast_vote("x1", election, candidate).await
                })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(Error::AlreadyVoted(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(votes(engine, a).await + votes(engine, b).await, 1);
    }

    #[backend_test]
    async fn concurrent_votes_by_one_identity(engine: Engine) {
        race_one_identity(&engine, 64).await;
    }

    #[backend_test(mongodb)]
    async fn concurrent_votes_by_one_identity_in_mongodb(engine: Engine) {
        race_one_identity(&engine, 8).await;
    }

    #[backend_test]
    async fn concurrent_votes_by_many_identities(engine: Engine) {
        let (election, a, b) = board_vote(&engine).await;
        let coordinator = engine.coordinator().clone();

        // Every voter tries twice, once for each candidate.
        let handles: Vec<_> = (0..100)
            .flat_map(|voter| [(voter, a), (voter, b)])
            .map(|(voter, candidate)| {
                let coordinator = coordinator.clone();
                rocket::tokio::spawn(async move {
                    coordinator
                        .cast_vote(&format!("10.0.0.{voter}"), election, candidate)
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 100);
        assert_eq!(votes(&engine, a).await + votes(&engine, b).await, 100);
        for voter in 0..100 {
            let identity = format!("10.0.0.{voter}");
            assert!(engine.ledger().has_voted(&identity, election).await.unwrap());
        }
    }

    #[backend_test]
    async fn expired_but_not_swept(engine: Engine, clock: ManualClock) {
        let (election, a, _) = board_vote(&engine).await;
        clock.advance(Duration::minutes(1));

        let stored = engine.registry().get_election(election).await.unwrap();
        assert!(stored.is_expired(clock.now()));
        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(_)));
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());
    }

    #[backend_test]
    async fn closed_and_unknown_elections(engine: Engine) {
        let (election, a, _) = board_vote(&engine).await;
        let coordinator = engine.coordinator();

        let err = coordinator.cast_vote("x1", election + 1, a).await.unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(_)));

        engine
            .registry()
            .close_election(&admin(), election)
            .await
            .unwrap();
        let err = coordinator.cast_vote("x1", election, a).await.unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(_)));
        assert_eq!(votes(&engine, a).await, 0);
    }

    #[backend_test]
    async fn unknown_candidate_writes_nothing(engine: Engine) {
        let (election, a, b) = board_vote(&engine).await;
        let coordinator = engine.coordinator();

        let err = coordinator
            .cast_vote("x1", election, a.max(b) + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());

        // The voter can still vote properly afterwards.
        coordinator.cast_vote("x1", election, a).await.unwrap();
    }

    #[backend_test]
    async fn candidate_from_another_election(engine: Engine) {
        let (old_election, old_a, _) = board_vote(&engine).await;
        let (election, _, _) = board_vote(&engine).await;

        let err = engine
            .coordinator()
            .cast_vote("x1", election, old_a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = engine
            .coordinator()
            .cast_vote("x1", old_election, old_a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(_)));
    }

    #[backend_test]
    async fn purge_removes_everything(engine: Engine) {
        let (election, a, b) = board_vote(&engine).await;
        engine.coordinator().cast_vote("x1", election, a).await.unwrap();
        engine.coordinator().cast_vote("x2", election, b).await.unwrap();

        engine
            .registry()
            .purge_election(&admin(), election)
            .await
            .unwrap();

        assert!(matches!(
            engine.registry().get_election(election).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(engine
            .store()
            .candidates(election, CandidateOrder::Insertion)
            .await
            .unwrap()
            .is_empty());
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());
        assert!(!engine.ledger().has_voted("x2", election).await.unwrap());
    }

    /// Something done to an election from "another request" at a chosen
    /// point in the middle of a vote.
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Interference {
        Nothing,
        Close,
        Purge,
        /// Fail the operation outright.
        Fail,
    }

    /// A memory store that interferes just before the ledger write or the
    /// counter increment.
    struct Interfering {
        inner: MemoryStore,
        before_ledger_write: Interference,
        before_increment: Interference,
    }

    impl Interfering {
        fn new(before_ledger_write: Interference, before_increment: Interference) -> Self {
            Self {
                inner: MemoryStore::new(),
                before_ledger_write,
                before_increment,
            }
        }

        async fn interfere(
            &self,
            interference: Interference,
            election_id: ElectionId,
        ) -> Result<()> {
            match interference {
                Interference::Nothing => {}
                Interference::Close => {
                    self.inner.close_election(election_id).await?;
                }
                Interference::Purge => {
                    self.inner.purge_election(election_id).await?;
                }
                Interference::Fail => {
                    return Err(Error::Internal("storage unavailable".to_string()));
                }
            }
            Ok(())
        }
    }

    #[rocket::async_trait]
    impl Store for Interfering {
        async fn open_election(&self, election: NewElection) -> Result<Election> {
            self.inner.open_election(election).await
        }
        async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
            self.inner.election(id).await
        }
        async fn open_elections(&self) -> Result<Vec<Election>> {
            self.inner.open_elections().await
        }
        async fn closed_elections(&self) -> Result<Vec<Election>> {
            self.inner.closed_elections().await
        }
        async fn close_election(&self, id: ElectionId) -> Result<bool> {
            self.inner.close_election(id).await
        }
        async fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<Election>> {
            self.inner.close_expired(now).await
        }
        async fn purge_election(&self, id: ElectionId) -> Result<bool> {
            self.inner.purge_election(id).await
        }
        async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
            self.inner.insert_candidate(candidate).await
        }
        async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
            self.inner.candidate(id).await
        }
        async fn candidates(
            &self,
            election_id: ElectionId,
            order: CandidateOrder,
        ) -> Result<Vec<Candidate>> {
            self.inner.candidates(election_id, order).await
        }
        async fn update_candidate(
            &self,
            id: CandidateId,
            name: String,
            photo: Option<String>,
        ) -> Result<Option<Candidate>> {
            self.inner.update_candidate(id, name, photo).await
        }
        async fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
            self.inner.delete_candidate(id).await
        }
        async fn increment_votes(&self, election_id: ElectionId, id: CandidateId) -> Result<bool> {
            self.interfere(self.before_increment, election_id).await?;
            self.inner.increment_votes(election_id, id).await
        }
        async fn insert_vote_record(&self, record: VoteRecord, now: DateTime<Utc>) -> Result<()> {
            self.interfere(self.before_ledger_write, record.election_id).await?;
            self.inner.insert_vote_record(record, now).await
        }
        async fn has_vote_record(&self, voter: &str, election_id: ElectionId) -> Result<bool> {
            self.inner.has_vote_record(voter, election_id).await
        }
    }

    fn interfering_engine(
        before_ledger_write: Interference,
        before_increment: Interference,
    ) -> Engine {
        Engine::new(
            Arc::new(Interfering::new(before_ledger_write, before_increment)),
            Arc::new(ManualClock::default()),
        )
    }

    #[rocket::async_test]
    async fn purged_before_ledger_write() {
        let engine = interfering_engine(Interference::Purge, Interference::Nothing);
        let (election, a, _) = board_vote(&engine).await;

        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(id) if id == election));
        assert!(matches!(
            engine.registry().get_election(election).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());
    }

    #[rocket::async_test]
    async fn closed_before_ledger_write() {
        let engine = interfering_engine(Interference::Close, Interference::Nothing);
        let (election, a, _) = board_vote(&engine).await;

        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(id) if id == election));
        let stored = engine.registry().get_election(election).await.unwrap();
        assert_eq!(stored.status, ElectionStatus::Closed);
        assert_eq!(votes(&engine, a).await, 0);
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());
    }

    #[rocket::async_test]
    async fn purged_before_count() {
        let engine = interfering_engine(Interference::Nothing, Interference::Purge);
        let (election, a, _) = board_vote(&engine).await;

        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionClosed(id) if id == election));
        assert!(!engine.ledger().has_voted("x1", election).await.unwrap());
        assert!(engine.store().candidate(a).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn recorded_but_not_counted() {
        log4rs_test_utils::test_logging::init_logging_once_for(
            ["pollbooth_backend"],
            None,
            None,
        );
        let engine = interfering_engine(Interference::Nothing, Interference::Fail);
        let (election, a, _) = board_vote(&engine).await;

        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        // The ledger entry stays, so the identity cannot try again.
        assert!(engine.ledger().has_voted("x1", election).await.unwrap());
        assert_eq!(votes(&engine, a).await, 0);
        let err = engine
            .coordinator()
            .cast_vote("x1", election, a)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted(_)));
    }
}
