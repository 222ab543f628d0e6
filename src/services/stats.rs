//! Dashboard statistics service

use std::sync::Arc;

use crate::{error::AppResult, models::stats::LibraryStats, repository::LibraryStore};

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn LibraryStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    pub async fn get_stats(&self) -> AppResult<LibraryStats> {
        self.store.stats().await
    }
}
