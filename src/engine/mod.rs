//! The election lifecycle and vote tallying engine.
//!
//! [`Registry`] owns elections, [`Tally`] owns candidates and their counters,
//! [`Ledger`] owns the record of who has voted, and [`Coordinator`] ties the
//! three together to cast a vote. [`Engine`] bundles them over one store and
//! one clock, and is what the web layer keeps in managed state.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::store::Store;

mod coordinator;
mod ledger;
mod registry;
mod tally;

pub use coordinator::Coordinator;
pub use ledger::Ledger;
pub use registry::Registry;
pub use tally::Tally;

/// Proof that the caller passed the admin check. Required by every admin
/// mutation; only obtainable through [`Admin::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admin(());

impl Admin {
    /// Turn the outcome of an external credential check into a capability.
    pub fn authorize(authorized: bool) -> Result<Self> {
        if authorized {
            Ok(Self(()))
        } else {
            Err(Error::Unauthorized(
                "Admin credentials are missing or incorrect".to_string(),
            ))
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    registry: Registry,
    tally: Tally,
    ledger: Ledger,
    coordinator: Coordinator,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let registry = Registry::new(store.clone(), clock);
        let tally = Tally::new(store.clone(), registry.clone());
        let ledger = Ledger::new(store.clone());
        let coordinator = Coordinator::new(registry.clone(), ledger.clone(), tally.clone());
        Self {
            store,
            registry,
            tally,
            ledger,
            coordinator,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}
