use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    common::election::ElectionStatus,
    db::{Candidate, Election, VoteRecord},
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for VoteRecord {
    const NAME: &'static str = "vote_records";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // At most one election may be open at once.
    let single_open = IndexModel::builder()
        .keys(doc! {"status": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! {"status": ElectionStatus::Open})
                .name("single_open_election".to_string())
                .build(),
        )
        .build();
    Coll::<Election>::from_db(db)
        .create_index(single_open, None)
        .await?;

    // Candidates are listed per election.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "votes": -1, "_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // The vote ledger: one record per voter per election. This index is what
    // actually prevents double voting.
    let ledger_index = IndexModel::builder()
        .keys(doc! {"voter": 1, "election_id": 1})
        .options(IndexOptions::builder().unique(true).build())
        .build();
    Coll::<VoteRecord>::from_db(db)
        .create_index(ledger_index, None)
        .await?;

    Ok(())
}
