//! Bookshelf library server
//!
//! Tracks how many copies of each book sit on the shelf and which users hold
//! the rest, exposed as a REST JSON API. Borrowing several books is atomic
//! and every return is checked against what the user actually holds.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Build the state over an already opened store
    pub fn new(config: AppConfig, store: Arc<dyn repository::LibraryStore>) -> Self {
        let services = services::Services::new(store, &config.circulation);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
