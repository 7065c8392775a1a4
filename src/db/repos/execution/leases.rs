use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::ExecutionLease;
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{require_non_empty, require_non_negative, require_valid_id};

fn row_to_lease(row: &Row) -> rusqlite::Result<ExecutionLease> {
    Ok(ExecutionLease {
        execution_id: row.get("execution_id")?,
        worker_id: row.get("worker_id")?,
        lease_version: row.get("lease_version")?,
        lease_expires_at: row.get("lease_expires_at")?,
        run_attempt: row.get("run_attempt")?,
    })
}

pub fn get_lease(pool: &DbPool, execution_id: &str) -> Result<Option<ExecutionLease>, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM execution_leases WHERE execution_id = ?1",
        params![execution_id.trim()],
        row_to_lease,
    )
    .optional()
    .map_err(AppError::Database)
}

pub fn list_leases(pool: &DbPool) -> Result<Vec<ExecutionLease>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM execution_leases ORDER BY execution_id ASC")?;
    let rows = stmt.query_map([], row_to_lease)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

/// Write the lease as given. Fencing (comparing `lease_version` against the
/// stored row) belongs to the dispatcher; this overwrites unconditionally.
pub fn upsert_lease(pool: &DbPool, lease: &ExecutionLease) -> Result<(), AppError> {
    let execution_id = lease.execution_id.trim();
    let worker_id = lease.worker_id.trim();
    require_valid_id("execution_id", execution_id)?;
    require_valid_id("worker_id", worker_id)?;
    require_non_empty("lease_expires_at", &lease.lease_expires_at)?;
    require_non_negative("lease_version", lease.lease_version)?;
    require_non_negative("run_attempt", lease.run_attempt)?;

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO execution_leases
         (execution_id, worker_id, lease_version, lease_expires_at, run_attempt)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(execution_id) DO UPDATE SET
            worker_id = excluded.worker_id,
            lease_version = excluded.lease_version,
            lease_expires_at = excluded.lease_expires_at,
            run_attempt = excluded.run_attempt",
        params![
            execution_id,
            worker_id,
            lease.lease_version,
            lease.lease_expires_at.trim(),
            lease.run_attempt,
        ],
    )?;
    tracing::debug!(
        execution_id,
        worker_id,
        lease_version = lease.lease_version,
        run_attempt = lease.run_attempt,
        "Execution lease written"
    );
    Ok(())
}
