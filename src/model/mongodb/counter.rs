use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::Coll;

/// Counter handing out election IDs.
pub const ELECTION_ID_COUNTER: &str = "election_id";
/// Counter handing out candidate IDs.
pub const CANDIDATE_ID_COUNTER: &str = "candidate_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the named counter.
    pub async fn next(counters: &Coll<Counter>, name: &str) -> Result<u32> {
        let counter = counters
            .find_one_and_update(doc! {"_id": name}, Self::increment(), Self::options())
            .await?;
        Self::unwrap(counter, name)
    }

    /// Atomically retrieve the next value of the named counter, as part of
    /// the session's transaction.
    pub async fn next_with_session(
        counters: &Coll<Counter>,
        name: &str,
        session: &mut ClientSession,
    ) -> Result<u32> {
        let counter = counters
            .find_one_and_update_with_session(
                doc! {"_id": name},
                Self::increment(),
                Self::options(),
                session,
            )
            .await?;
        Self::unwrap(counter, name)
    }

    fn increment() -> mongodb::bson::Document {
        doc! { "$inc": { "next": 1 } }
    }

    fn options() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build()
    }

    fn unwrap(counter: Option<Counter>, name: &str) -> Result<u32> {
        counter
            .map(|c| c.next)
            .ok_or_else(|| Error::Internal(format!("Failed to find counter {name}")))
    }
}

/// Ensure the ID counters exist, starting from 1. Existing counters are left
/// untouched, so this is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<()> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    for name in [ELECTION_ID_COUNTER, CANDIDATE_ID_COUNTER] {
        counters
            .update_one(
                doc! {"_id": name},
                doc! {"$setOnInsert": {"next": 1_u32}},
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}
