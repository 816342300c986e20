use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::Result,
    model::{
        api::election::{ActiveElection, ElectionDetail, ElectionView},
        common::election::ElectionId,
    },
};

pub fn routes() -> Vec<Route> {
    routes![active_election, election_history, election_detail]
}

/// The election currently accepting votes, with its candidates in ballot order.
#[get("/public/active")]
async fn active_election(engine: &State<Engine>) -> Result<Json<ActiveElection>> {
    let detail = match engine.registry().get_open_election().await? {
        Some(election) => {
            let candidates = engine.tally().list_candidates(election.id).await?;
            Some(ElectionDetail::new(election, candidates))
        }
        None => None,
    };
    Ok(Json(detail.into()))
}

#[get("/public/history")]
async fn election_history(engine: &State<Engine>) -> Result<Json<Vec<ElectionView>>> {
    let history = engine
        .registry()
        .list_closed_elections()
        .await?
        .into_iter()
        .map(ElectionView::from)
        .collect();
    Ok(Json(history))
}

#[get("/public/elections/<election_id>")]
async fn election_detail(
    election_id: ElectionId,
    engine: &State<Engine>,
) -> Result<Json<ElectionDetail>> {
    let registry = engine.registry();
    let election = registry.get_election(election_id).await?.as_of(registry.now());
    let candidates = engine.tally().list_candidates(election_id).await?;
    Ok(Json(ElectionDetail::new(election, candidates)))
}
