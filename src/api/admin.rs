use rocket::{serde::json::Json, Route, State};

use crate::{
    config::Config,
    engine::{Admin, Engine},
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            candidate::{CandidateSpec, CandidateUpdate},
            election::{AdminDashboard, ElectionDetail, ElectionSpec, ElectionView},
            Message,
        },
        common::election::{CandidateId, ElectionId},
        db::{Candidate, CandidateOrder},
    },
};

use super::guards::AdminFlag;

pub fn routes() -> Vec<Route> {
    routes![
        login,
        dashboard,
        open_election,
        close_election,
        delete_election,
        add_candidate,
        edit_candidate,
        delete_candidate,
    ]
}

#[post("/admin/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<AdminCredentials>,
    config: &State<Config>,
) -> Result<Json<Message>> {
    Admin::authorize(config.is_admin_password(&credentials.password))?;
    Ok(Json(Message::new("Logged in")))
}

/// The open election with its live standings, plus past elections.
#[get("/admin/data")]
async fn dashboard(flag: AdminFlag, engine: &State<Engine>) -> Result<Json<AdminDashboard>> {
    Admin::authorize(flag.0)?;

    let active = match engine.registry().get_open_election().await? {
        Some(election) => {
            let candidates = engine
                .tally()
                .list_candidates_ordered(election.id, CandidateOrder::Ranking)
                .await?;
            Some(ElectionDetail::new(election, candidates))
        }
        None => None,
    };
    let history = engine
        .registry()
        .list_closed_elections()
        .await?
        .into_iter()
        .map(ElectionView::from)
        .collect();

    Ok(Json(AdminDashboard { active, history }))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn open_election(
    flag: AdminFlag,
    spec: Json<ElectionSpec>,
    engine: &State<Engine>,
    config: &State<Config>,
) -> Result<Json<ElectionView>> {
    let admin = Admin::authorize(flag.0)?;
    let minutes = spec.minutes.unwrap_or_else(|| config.default_duration());
    let election = engine
        .registry()
        .open_new_election(&admin, &spec.title, minutes)
        .await?;
    Ok(Json(election.into()))
}

#[post("/admin/elections/<election_id>/close")]
async fn close_election(
    flag: AdminFlag,
    election_id: ElectionId,
    engine: &State<Engine>,
) -> Result<Json<Message>> {
    let admin = Admin::authorize(flag.0)?;
    engine.registry().close_election(&admin, election_id).await?;
    Ok(Json(Message::new(format!("Election {election_id} closed"))))
}

#[delete("/admin/elections/<election_id>")]
async fn delete_election(
    flag: AdminFlag,
    election_id: ElectionId,
    engine: &State<Engine>,
) -> Result<Json<Message>> {
    let admin = Admin::authorize(flag.0)?;
    engine.registry().purge_election(&admin, election_id).await?;
    Ok(Json(Message::new(format!("Election {election_id} deleted"))))
}

/// Add a candidate to the given election, or to the open one if none is named.
#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    flag: AdminFlag,
    spec: Json<CandidateSpec>,
    engine: &State<Engine>,
) -> Result<Json<Candidate>> {
    let admin = Admin::authorize(flag.0)?;
    let CandidateSpec {
        name,
        photo,
        election_id,
    } = spec.into_inner();

    let election_id = match election_id {
        Some(id) => id,
        None => engine
            .registry()
            .get_open_election()
            .await?
            .map(|election| election.id)
            .ok_or_else(|| {
                Error::InvalidInput("No election is open to add candidates to".to_string())
            })?,
    };

    let candidate = engine
        .tally()
        .add_candidate(&admin, election_id, &name, photo)
        .await?;
    Ok(Json(candidate))
}

#[put("/admin/candidates/<candidate_id>", data = "<update>", format = "json")]
async fn edit_candidate(
    flag: AdminFlag,
    candidate_id: CandidateId,
    update: Json<CandidateUpdate>,
    engine: &State<Engine>,
) -> Result<Json<Candidate>> {
    let admin = Admin::authorize(flag.0)?;
    let CandidateUpdate { name, photo } = update.into_inner();
    let candidate = engine
        .tally()
        .rename_candidate(&admin, candidate_id, &name, photo)
        .await?;
    Ok(Json(candidate))
}

#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    flag: AdminFlag,
    candidate_id: CandidateId,
    engine: &State<Engine>,
) -> Result<Json<Message>> {
    let admin = Admin::authorize(flag.0)?;
    engine.tally().delete_candidate(&admin, candidate_id).await?;
    Ok(Json(Message::new(format!("Candidate {candidate_id} deleted"))))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };
    use serde::Serialize;

    use crate::{
        api::guards::ADMIN_PASSWORD_HEADER,
        clock::{Clock, ManualClock},
        model::{api::election::ActiveElection, common::election::ElectionStatus, store::Store},
        TEST_ADMIN_PASSWORD,
    };

    use super::*;

    fn admin_header() -> Header<'static> {
        Header::new(ADMIN_PASSWORD_HEADER, TEST_ADMIN_PASSWORD)
    }

    async fn post_json<'c>(
        client: &'c Client,
        path: &str,
        body: &impl Serialize,
    ) -> LocalResponse<'c> {
        client
            .post(path.to_string())
            .header(ContentType::JSON)
            .header(admin_header())
            .body(serde_json::to_string(body).unwrap())
            .dispatch()
            .await
    }

    async fn read<T: serde::de::DeserializeOwned>(response: LocalResponse<'_>) -> T {
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn open(client: &Client, title: &str, minutes: Option<f64>) -> ElectionView {
        let spec = ElectionSpec {
            title: title.to_string(),
            minutes,
        };
        let response = post_json(client, "/api/admin/elections", &spec).await;
        assert_eq!(Status::Ok, response.status());
        read(response).await
    }

    async fn add(client: &Client, name: &str, election_id: Option<ElectionId>) -> Candidate {
        let spec = CandidateSpec {
            name: name.to_string(),
            photo: None,
            election_id,
        };
        let response = post_json(client, "/api/admin/candidates", &spec).await;
        assert_eq!(Status::Ok, response.status());
        read(response).await
    }

    #[backend_test]
    async fn login_checks_password(client: Client) {
        let response = client
            .post("/api/admin/login")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&AdminCredentials::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .post("/api/admin/login")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&AdminCredentials::wrong()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn admin_routes_need_password(client: Client, engine: Engine) {
        let spec = ElectionSpec {
            title: "Board Vote".to_string(),
            minutes: Some(1.0),
        };
        let response = client
            .post("/api/admin/elections")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client
            .get("/api/admin/data")
            .header(Header::new(ADMIN_PASSWORD_HEADER, "letmein"))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.delete("/api/admin/elections/1").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        assert!(engine.store().open_elections().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn open_uses_default_duration(client: Client, clock: ManualClock) {
        let election = open(&client, "Board Vote", None).await;
        assert_eq!(election.status, ElectionStatus::Open);
        assert_eq!(election.created_at, clock.now());
        assert_eq!(election.end_time - election.created_at, Duration::minutes(20));

        let election = open(&client, "Quick Poll", Some(0.5)).await;
        assert_eq!(election.end_time - election.created_at, Duration::seconds(30));
    }

    #[backend_test]
    async fn open_rejects_bad_input(client: Client, engine: Engine) {
        let cases = [
            ("", Some(1.0)),
            ("Board Vote", Some(0.0)),
            ("Board Vote", Some(-5.0)),
        ];
        for (title, minutes) in cases {
            let spec = ElectionSpec {
                title: title.to_string(),
                minutes,
            };
            let response = post_json(&client, "/api/admin/elections", &spec).await;
            assert_eq!(Status::BadRequest, response.status());
        }
        assert!(engine.store().open_elections().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn opening_closes_the_previous_election(client: Client) {
        let first = open(&client, "First", Some(5.0)).await;
        let second = open(&client, "Second", Some(5.0)).await;

        let response = client
            .get("/api/admin/data")
            .header(admin_header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let dashboard: AdminDashboard = read(response).await;
        assert_eq!(dashboard.active.unwrap().election.id, second.id);
        let history: Vec<_> = dashboard.history.iter().map(|e| e.id).collect();
        assert_eq!(history, [first.id]);
    }

    #[backend_test]
    async fn dashboard_ranks_live_standings(client: Client, engine: Engine) {
        let election = open(&client, "Board Vote", Some(1.0)).await;
        let a = add(&client, "A", None).await;
        let b = add(&client, "B", None).await;
        engine
            .coordinator()
            .cast_vote("x1", election.id, b.id)
            .await
            .unwrap();

        let response = client
            .get("/api/admin/data")
            .header(admin_header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let dashboard: AdminDashboard = read(response).await;
        let standings: Vec<_> = dashboard
            .active
            .unwrap()
            .candidates
            .iter()
            .map(|c| (c.id, c.votes))
            .collect();
        assert_eq!(standings, [(b.id, 1), (a.id, 0)]);

        // Voters still see ballot order.
        let response = client.get("/api/public/active").dispatch().await;
        let active: ActiveElection = read(response).await;
        let ids: Vec<_> = active
            .election
            .unwrap()
            .candidates
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [a.id, b.id]);
    }

    #[backend_test]
    async fn candidates_default_to_open_election(client: Client) {
        // Nothing open yet.
        let spec = CandidateSpec {
            name: "A".to_string(),
            photo: None,
            election_id: None,
        };
        let response = post_json(&client, "/api/admin/candidates", &spec).await;
        assert_eq!(Status::BadRequest, response.status());

        let election = open(&client, "Board Vote", Some(1.0)).await;
        let a = add(&client, "A", None).await;
        assert_eq!(a.election_id, election.id);
        assert_eq!(a.votes, 0);
        assert!(a.photo.starts_with("https://ui-avatars.com/api/"));

        let b = add(&client, "B", Some(election.id)).await;
        assert_eq!(b.election_id, election.id);
    }

    #[backend_test]
    async fn candidates_only_for_open_elections(client: Client, clock: ManualClock) {
        let election = open(&client, "Board Vote", Some(1.0)).await;
        clock.advance(Duration::seconds(61));

        let spec = CandidateSpec {
            name: "Late".to_string(),
            photo: None,
            election_id: Some(election.id),
        };
        let response = post_json(&client, "/api/admin/candidates", &spec).await;
        assert_eq!(Status::BadRequest, response.status());

        let spec = CandidateSpec {
            election_id: Some(election.id + 1),
            ..spec
        };
        let response = post_json(&client, "/api/admin/candidates", &spec).await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn edit_and_delete_candidate(client: Client, engine: Engine) {
        open(&client, "Board Vote", Some(1.0)).await;
        let a = add(&client, "A", None).await;

        let update = CandidateUpdate {
            name: "Alice".to_string(),
            photo: None,
        };
        let response = client
            .put(format!("/api/admin/candidates/{}", a.id))
            .header(ContentType::JSON)
            .header(admin_header())
            .body(serde_json::to_string(&update).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let renamed: Candidate = read(response).await;
        assert_eq!(renamed.name, "Alice");
        assert_eq!(renamed.photo, a.photo);

        let response = client
            .delete(format!("/api/admin/candidates/{}", a.id))
            .header(admin_header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(engine.store().candidate(a.id).await.unwrap().is_none());

        let response = client
            .delete(format!("/api/admin/candidates/{}", a.id))
            .header(admin_header())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn close_and_delete_election(client: Client, engine: Engine) {
        let election = open(&client, "Board Vote", Some(1.0)).await;
        add(&client, "A", None).await;

        for _ in 0..2 {
            let response = client
                .post(format!("/api/admin/elections/{}/close", election.id))
                .header(admin_header())
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
        }
        let closed = engine.registry().get_election(election.id).await.unwrap();
        assert_eq!(closed.status, ElectionStatus::Closed);

        let response = client
            .delete(format!("/api/admin/elections/{}", election.id))
            .header(admin_header())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get(format!("/api/public/elections/{}", election.id))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        assert!(engine
            .store()
            .candidates(election.id, CandidateOrder::Insertion)
            .await
            .unwrap()
            .is_empty());
    }
}
