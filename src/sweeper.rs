//! Background closing of expired elections.
//!
//! Votes are never accepted after an election's end time whether or not the
//! sweeper has run; it only makes sure the stored status eventually catches up
//! for elections nobody is voting in.

use std::sync::Arc;
use std::time::Duration;

use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{self, sync::Mutex, sync::Notify, task::JoinHandle},
    Orbit, Rocket,
};

use crate::{config::Config, engine::Engine, engine::Registry, error::Result, model::db::Election};

/// Close every expired election once, logging each one closed.
pub async fn sweep(registry: &Registry) -> Result<Vec<Election>> {
    let closed = registry.close_expired().await?;
    for election in &closed {
        info!(
            "Election {} \"{}\" ended at {}; closed",
            election.id, election.title, election.end_time
        );
    }
    trace!("Sweep closed {} elections", closed.len());
    Ok(closed)
}

/// A running sweeper task.
pub struct Sweeper {
    handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl Sweeper {
    /// Start sweeping every `period`, beginning one period from now.
    pub fn spawn(registry: Registry, period: Duration) -> Self {
        let signal = Arc::new(Notify::new());
        let task_signal = signal.clone();
        let handle = tokio::spawn(async move {
            loop {
                // Timing out is the normal case; being notified means "sweep early".
                let _ = tokio::time::timeout(period, task_signal.notified()).await;
                if let Err(e) = sweep(&registry).await {
                    error!("Sweep failed, will retry next period: {e}");
                }
            }
        });
        debug!("Sweeper started with a period of {period:?}");
        Self { handle, signal }
    }

    /// Sweep as soon as possible instead of waiting for the period to elapse.
    pub fn trigger_now(&self) {
        self.signal.notify_one();
    }

    /// Stop the task, waiting for it to finish.
    pub async fn stop(self) {
        self.handle.abort();
        // Cancellation is the expected outcome here.
        let _ = self.handle.await;
        debug!("Sweeper stopped");
    }
}

/// A fairing that starts the sweeper once Rocket is running and stops it at
/// shutdown. Depends on [`Config`] and [`Engine`] being in managed state.
#[derive(Default)]
pub struct SweeperFairing {
    sweeper: Mutex<Option<Sweeper>>,
}

#[rocket::async_trait]
impl Fairing for SweeperFairing {
    fn info(&self) -> Info {
        Info {
            name: "Expiry Sweeper",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (engine, config) = match (rocket.state::<Engine>(), rocket.state::<Config>()) {
            (Some(engine), Some(config)) => (engine, config),
            _ => {
                error!("Engine or config unavailable; expired elections will not be swept");
                return;
            }
        };
        let sweeper = Sweeper::spawn(engine.registry().clone(), config.sweep_interval());
        if let Some(old) = self.sweeper.lock().await.replace(sweeper) {
            old.stop().await;
        }
        info!("Sweeping expired elections every {:?}", config.sweep_interval());
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.stop().await;
        }
    }
}
