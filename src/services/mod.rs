//! Business logic services

pub mod circulation;
pub mod inventory;
pub mod ledger;
pub mod stats;
pub mod users;

use std::sync::Arc;

use crate::{config::CirculationConfig, error::AppResult, repository::LibraryStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub inventory: inventory::InventoryService,
    pub ledger: ledger::LedgerService,
    pub circulation: circulation::CirculationService,
    pub users: users::UsersService,
    pub stats: stats::StatsService,
    store: Arc<dyn LibraryStore>,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LibraryStore>, circulation: &CirculationConfig) -> Self {
        Self {
            inventory: inventory::InventoryService::new(store.clone()),
            ledger: ledger::LedgerService::new(store.clone()),
            circulation: circulation::CirculationService::new(
                store.clone(),
                circulation.max_items_per_request,
            ),
            users: users::UsersService::new(store.clone()),
            stats: stats::StatsService::new(store.clone()),
            store,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
