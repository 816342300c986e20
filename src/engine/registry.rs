use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{
    common::election::ElectionId,
    db::{Election, NewElection},
    store::Store,
};

use super::Admin;

/// Milliseconds in a minute, for converting fractional durations.
const MINUTE_MILLIS: f64 = 60_000.0;

/// Owns election records and their open/closed lifecycle.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The current time, according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Close whatever election is open and open a new one lasting
    /// `duration_minutes` from now.
    pub async fn open_new_election(
        &self,
        _admin: &Admin,
        title: &str,
        duration_minutes: f64,
    ) -> Result<Election> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput(
                "Election title must not be empty".to_string(),
            ));
        }
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Election duration must be a positive number of minutes, got {duration_minutes}"
            )));
        }

        let now = self.now();
        let duration = Duration::milliseconds((duration_minutes * MINUTE_MILLIS).round() as i64);
        let end_time = now.checked_add_signed(duration).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Election duration of {duration_minutes} minutes is too long"
            ))
        })?;

        let election = self
            .store
            .open_election(NewElection {
                title: title.to_string(),
                created_at: now,
                end_time,
            })
            .await?;
        info!(
            "Opened election {} \"{}\", closing at {}",
            election.id, election.title, election.end_time
        );
        Ok(election)
    }

    /// The election currently accepting votes, if any. An election whose end
    /// time has passed is not returned, even if the sweeper hasn't closed it yet.
    pub async fn get_open_election(&self) -> Result<Option<Election>> {
        let now = self.now();
        Ok(self
            .store
            .open_elections()
            .await?
            .into_iter()
            .find(|election| election.is_votable(now)))
    }

    pub async fn get_election(&self, id: ElectionId) -> Result<Election> {
        self.store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// The election, if it is accepting votes right now.
    pub async fn votable_election(&self, id: ElectionId) -> Result<Election> {
        let now = self.now();
        match self.store.election(id).await? {
            Some(election) if election.is_votable(now) => Ok(election),
            _ => Err(Error::ElectionClosed(id)),
        }
    }

    /// Closed elections, newest first.
    pub async fn list_closed_elections(&self) -> Result<Vec<Election>> {
        self.store.closed_elections().await
    }

    /// Close the election. Closing an already-closed election is a no-op.
    pub async fn close_election(&self, _admin: &Admin, id: ElectionId) -> Result<()> {
        if !self.store.close_election(id).await? {
            return Err(Error::not_found(format!("Election {id}")));
        }
        info!("Closed election {id}");
        Ok(())
    }

    /// Delete the election together with its candidates and vote records.
    pub async fn purge_election(&self, _admin: &Admin, id: ElectionId) -> Result<()> {
        if !self.store.purge_election(id).await? {
            return Err(Error::not_found(format!("Election {id}")));
        }
        warn!("Purged election {id} and all of its votes");
        Ok(())
    }

    /// Close every election that is still marked open but has passed its end
    /// time, returning the ones closed.
    pub async fn close_expired(&self) -> Result<Vec<Election>> {
        self.store.close_expired(self.now()).await
    }
}
