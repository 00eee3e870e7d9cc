//! Family Gift Ledger server library
//!
//! This module exports the core types and functions for the binary and the
//! integration tests.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod routes;
pub mod security;
pub mod session;

pub use config::Config;
pub use db::{open_database, Db};
pub use error::{AppError, Result};
pub use routes::build_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
}

impl AppState {
    /// Create a new AppState with the given database pool and configuration
    pub fn new(db: Db, config: Config) -> Self {
        Self { db, config }
    }
}
