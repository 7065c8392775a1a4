#[macro_use]
pub mod macros;
pub mod codec;
pub mod migrations;
pub mod models;
pub mod repos;

use std::time::Duration;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::StoreConfig;
use crate::error::AppError;

pub type DbPool = Pool<SqliteConnectionManager>;

/// The store is a single writer: every caller queues on this one connection,
/// so multi-statement transactions linearize against each other.
const MAX_CONNECTIONS: u32 = 1;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection customizer that sets per-connection SQLite pragmas.
#[derive(Debug)]
struct SqlitePragmaCustomizer;

impl CustomizeConnection<rusqlite::Connection, rusqlite::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;",
        )?;
        Ok(())
    }
}

/// Open the store: create the parent directory, enable WAL, apply the schema.
pub fn init_db(config: &StoreConfig) -> Result<DbPool, AppError> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(path = %config.db_path.display(), "Initializing database");

    let manager = SqliteConnectionManager::file(&config.db_path);
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .connection_timeout(CONNECTION_TIMEOUT)
        .connection_customizer(Box::new(SqlitePragmaCustomizer))
        .build(manager)?;

    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("SQLite pragmas configured (WAL, FK, busy_timeout)");
        migrations::run(&conn)?;
    }

    tracing::info!("Database initialized successfully");
    Ok(pool)
}

#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, AppError> {
    // Use a unique temp file for each test to avoid in-memory connection issues with r2d2.
    let tmp = std::env::temp_dir().join(format!("hub_authority_test_{}.db", uuid::Uuid::new_v4()));
    let manager = SqliteConnectionManager::file(&tmp);
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(SqlitePragmaCustomizer))
        .build(manager)?;

    let conn = pool.get()?;
    migrations::run(&conn)?;
    drop(conn);
    Ok(pool)
}
