//! Authority store for the agent hub.
//!
//! Owns credentials and sessions, the RBAC/ABAC catalogs with the permission
//! snapshot derived from them, the conversation/execution/event graph, worker
//! leases, and the workspace/project configuration records. Every operation is
//! a free function over a [`DbPool`] capped at one connection, so the store is
//! a single serialized writer.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{SessionTtl, StoreConfig};
pub use db::{init_db, DbPool};
pub use error::AppError;

/// Install logging and open the store described by the environment.
pub fn open_from_env() -> Result<DbPool, AppError> {
    logging::init();
    let config = StoreConfig::from_env()?;
    tracing::info!("Starting hub authority store v{}", env!("CARGO_PKG_VERSION"));
    init_db(&config)
}
