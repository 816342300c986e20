mod collection;
mod counter;
mod errors;
mod store;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_counters_exist, Counter, CANDIDATE_ID_COUNTER, ELECTION_ID_COUNTER};
pub use errors::{is_duplicate_key_error, is_transient_transaction_error};
pub use store::MongoStore;
