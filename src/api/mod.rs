use rocket::Route;

mod admin;
mod guards;
mod public;
mod voting;

pub use guards::{AdminFlag, VoterIdentity};

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}
