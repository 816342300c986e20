mod status;

pub use status::ElectionStatus;

/// Our election IDs are integers, handed out in increasing order.
pub type ElectionId = u32;
/// Our candidate IDs are integers, handed out in increasing order, so sorting
/// by ID gives insertion order.
pub type CandidateId = u32;
