use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId, ElectionStatus},
    db::{Candidate, CandidateOrder, Election, NewCandidate, NewElection, VoteRecord},
    store::Store,
};

use super::{
    counter::{ensure_counters_exist, Counter, CANDIDATE_ID_COUNTER, ELECTION_ID_COUNTER},
    ensure_indexes_exist, is_duplicate_key_error, is_transient_transaction_error, Coll,
};

/// How many times a vote transaction is retried after a write conflict.
const MAX_VOTE_RETRIES: usize = 10;

/// A store backed by MongoDB. Multi-document operations use transactions, so
/// the server must be a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    vote_records: Coll<VoteRecord>,
    counters: Coll<Counter>,
}

impl MongoStore {
    /// Connect to the database, making sure the required indexes and ID
    /// counters exist.
    pub async fn connect(db_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        let store = Self {
            elections: Coll::from_db(&db),
            candidates: Coll::from_db(&db),
            vote_records: Coll::from_db(&db),
            counters: Coll::from_db(&db),
            client,
            db,
        };
        ensure_counters_exist(&store.counters).await?;
        Ok(store)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// One attempt at inserting a vote record, in a transaction with the
    /// votability check.
    async fn try_insert_vote_record(
        &self,
        record: &VoteRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let election_id = record.election_id;
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Writing to the election makes a concurrent close or purge conflict
        // with this transaction instead of slipping in after the check.
        let votable = doc! {
            "_id": election_id,
            "status": ElectionStatus::Open,
            "end_time": {"$gt": BsonDateTime::from_chrono(now)},
        };
        let result = self
            .elections
            .update_one_with_session(
                votable,
                doc! {"$inc": {"ledger_writes": 1_i64}},
                None,
                &mut session,
            )
            .await?;
        if result.matched_count == 0 {
            session.abort_transaction().await?;
            return Err(Error::ElectionClosed(election_id));
        }

        match self
            .vote_records
            .insert_one_with_session(record, None, &mut session)
            .await
        {
            Ok(_) => {}
            // Dropping the session aborts the transaction.
            Err(e) if is_duplicate_key_error(&e) => return Err(Error::DuplicateVote(election_id)),
            Err(e) => return Err(e.into()),
        }

        session.commit_transaction().await?;
        Ok(())
    }
}

fn id_filter(id: u32) -> Document {
    doc! {"_id": id}
}

fn set_status(status: ElectionStatus) -> Document {
    doc! {"$set": {"status": status}}
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn open_election(&self, election: NewElection) -> Result<Election> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Close first, otherwise the single-open index rejects the insert.
        self.elections
            .update_many_with_session(
                doc! {"status": ElectionStatus::Open},
                set_status(ElectionStatus::Closed),
                None,
                &mut session,
            )
            .await?;
        let id = Counter::next_with_session(&self.counters, ELECTION_ID_COUNTER, &mut session)
            .await?;
        let election = election.with_id(id);
        self.elections
            .insert_one_with_session(&election, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(election)
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id_filter(id), None).await?)
    }

    async fn open_elections(&self) -> Result<Vec<Election>> {
        let filter = doc! {"status": ElectionStatus::Open};
        Ok(self.elections.find(filter, None).await?.try_collect().await?)
    }

    async fn closed_elections(&self) -> Result<Vec<Election>> {
        let filter = doc! {"status": ElectionStatus::Closed};
        let newest_first = FindOptions::builder().sort(doc! {"_id": -1}).build();
        Ok(self
            .elections
            .find(filter, newest_first)
            .await?
            .try_collect()
            .await?)
    }

    async fn close_election(&self, id: ElectionId) -> Result<bool> {
        let result = self
            .elections
            .update_one(id_filter(id), set_status(ElectionStatus::Closed), None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<Election>> {
        let filter = doc! {
            "status": ElectionStatus::Open,
            "end_time": {"$lte": BsonDateTime::from_chrono(now)},
        };
        let expired: Vec<Election> = self.elections.find(filter, None).await?.try_collect().await?;

        // Close them one at a time, only counting those still open, so that
        // a concurrent close isn't reported twice.
        let mut closed = Vec::with_capacity(expired.len());
        for mut election in expired {
            let filter = doc! {"_id": election.id, "status": ElectionStatus::Open};
            let result = self
                .elections
                .update_one(filter, set_status(ElectionStatus::Closed), None)
                .await?;
            if result.modified_count == 1 {
                election.status = ElectionStatus::Closed;
                closed.push(election);
            }
        }
        Ok(closed)
    }

    async fn purge_election(&self, id: ElectionId) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = self
            .elections
            .delete_one_with_session(id_filter(id), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        let filter = doc! {"election_id": id};
        self.candidates
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        self.vote_records
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let id = Counter::next(&self.counters, CANDIDATE_ID_COUNTER).await?;
        let candidate = candidate.with_id(id);
        self.candidates.insert_one(&candidate, None).await?;
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id_filter(id), None).await?)
    }

    async fn candidates(
        &self,
        election_id: ElectionId,
        order: CandidateOrder,
    ) -> Result<Vec<Candidate>> {
        let sort = match order {
            CandidateOrder::Insertion => doc! {"_id": 1},
            CandidateOrder::Ranking => doc! {"votes": -1, "_id": 1},
        };
        let options = FindOptions::builder().sort(sort).build();
        Ok(self
            .candidates
            .find(doc! {"election_id": election_id}, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        name: String,
        photo: Option<String>,
    ) -> Result<Option<Candidate>> {
        let mut fields = doc! {"name": name};
        if let Some(photo) = photo {
            fields.insert("photo", photo);
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .candidates
            .find_one_and_update(id_filter(id), doc! {"$set": fields}, options)
            .await?)
    }

    async fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
        let result = self.candidates.delete_one(id_filter(id), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn increment_votes(&self, election_id: ElectionId, id: CandidateId) -> Result<bool> {
        let filter = doc! {"_id": id, "election_id": election_id};
        let result = self
            .candidates
            .update_one(filter, doc! {"$inc": {"votes": 1_i64}}, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn insert_vote_record(&self, record: VoteRecord, now: DateTime<Utc>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.try_insert_vote_record(&record, now).await {
                Err(Error::Db(e))
                    if is_transient_transaction_error(&e) && attempt < MAX_VOTE_RETRIES =>
                {
                    debug!(
                        "Vote transaction for election {} conflicted, retrying (attempt {attempt})",
                        record.election_id
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn has_vote_record(&self, voter: &str, election_id: ElectionId) -> Result<bool> {
        let filter = doc! {"voter": voter, "election_id": election_id};
        Ok(self.vote_records.find_one(filter, None).await?.is_some())
    }
}
