use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::Result,
    logging::RequestId,
    model::api::vote::{VoteReceipt, VoteRequest},
};

use super::guards::VoterIdentity;

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

#[post("/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    request_id: &RequestId,
    identity: VoterIdentity,
    vote: Json<VoteRequest>,
    engine: &State<Engine>,
) -> Result<Json<VoteReceipt>> {
    debug!(
        "req{request_id}: {} voting for candidate {} in election {}",
        identity.0, vote.candidate_id, vote.election_id
    );
    let receipt = engine
        .coordinator()
        .cast_vote(&identity.0, vote.election_id, vote.candidate_id)
        .await?;
    Ok(Json(receipt))
}
