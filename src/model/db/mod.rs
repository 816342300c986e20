//! DB-compatible (e.g. de/serialisable) types.
//!
//! Datetimes are serialised in MongoDB's own format, so these types should be
//! converted into their [`crate::model::api`] counterparts before being sent
//! to clients.

mod candidate;
pub use candidate::{Candidate, CandidateOrder, NewCandidate};

mod election;
pub use election::{Election, NewElection};

mod vote_record;
pub use vote_record::VoteRecord;
