// Library root - exports for integration tests and the init_shop binary

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use handlers::*;

// Re-export AppState for tests (matches main.rs)
use database::DatabasePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub config: Arc<Config>,
}
