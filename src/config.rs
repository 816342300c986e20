use std::sync::Arc;
use std::time::Duration;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    clock::SystemClock,
    engine::Engine,
    model::{
        mongodb::MongoStore,
        store::{MemoryStore, Store},
    },
};

fn default_sweep_interval() -> u64 {
    60
}

fn default_duration() -> f64 {
    20.0
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_sweep_interval")]
    sweep_interval: u64,
    #[serde(default = "default_duration")]
    default_duration: f64,
    // secrets
    admin_password: String,
}

impl Config {
    /// How often the sweeper closes expired elections.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    /// Election duration in minutes used when an admin doesn't give one.
    pub fn default_duration(&self) -> f64 {
        self.default_duration
    }

    /// Does the given password grant admin rights?
    pub fn is_admin_password(&self, password: &str) -> bool {
        !self.admin_password.is_empty() && self.admin_password == password
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.admin_password.is_empty() {
            warn!("`admin_password` is empty; admin routes will reject every request");
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: Option<String>,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "pollbooth".to_string()
}

/// A fairing that picks a store, connects to it if needed, and places an
/// [`Engine`] over it into managed state.
///
/// With a `db_uri`, MongoDB is used. Without one, everything is kept in
/// memory and lost on restart.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn Store> = match config.db_uri {
            Some(db_uri) => {
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured; elections are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        rocket = rocket.manage(Engine::new(store, Arc::new(SystemClock)));
        Ok(rocket)
    }
}
