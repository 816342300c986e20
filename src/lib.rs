#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::engine::Engine;
use crate::logging::LoggerFairing;
use crate::sweeper::SweeperFairing;

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod sweeper;

/// Create a server configured from `Rocket.toml` and the environment, with
/// its store chosen by [`StoreFairing`].
pub fn build() -> Rocket<Build> {
    with_fairings_and_routes(rocket::build()).attach(StoreFairing)
}

/// Create a server over an existing engine, skipping store selection.
pub fn rocket_for_engine(figment: Figment, engine: Engine) -> Rocket<Build> {
    with_fairings_and_routes(rocket::custom(figment)).manage(engine)
}

fn with_fairings_and_routes(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(SweeperFairing::default())
}

#[cfg(test)]
pub(crate) const TEST_ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Configuration for test servers: a known admin password and no Rocket logging.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    rocket::Config::figment()
        .merge(("admin_password", TEST_ADMIN_PASSWORD))
        .merge(("log_level", "off"))
}

/// Where `#[backend_test(mongodb)]` tests find their database.
#[cfg(test)]
pub(crate) fn test_db_uri() -> String {
    std::env::var("DB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}
