use rusqlite::{params, Row};

use crate::db::codec::{encode_json, json_column, timestamp_or_now};
use crate::db::models::WorkerRegistration;
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::require_valid_id;

fn row_to_worker(row: &Row) -> rusqlite::Result<WorkerRegistration> {
    Ok(WorkerRegistration {
        worker_id: row.get("worker_id")?,
        capabilities: json_column(row, "capabilities_json")?,
        status: row.get("status")?,
        last_heartbeat: row.get("last_heartbeat")?,
    })
}

pub fn list_workers(pool: &DbPool) -> Result<Vec<WorkerRegistration>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM workers ORDER BY worker_id ASC")?;
    let rows = stmt.query_map([], row_to_worker)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

/// Register or re-register a worker. The latest heartbeat overwrites everything.
pub fn upsert_worker(pool: &DbPool, worker: &WorkerRegistration) -> Result<(), AppError> {
    let worker_id = worker.worker_id.trim();
    require_valid_id("worker_id", worker_id)?;
    let status = match worker.status.trim() {
        "" => "online",
        other => other,
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO workers (worker_id, capabilities_json, status, last_heartbeat)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(worker_id) DO UPDATE SET
            capabilities_json = excluded.capabilities_json,
            status = excluded.status,
            last_heartbeat = excluded.last_heartbeat",
        params![
            worker_id,
            encode_json(&worker.capabilities)?,
            status,
            timestamp_or_now(&worker.last_heartbeat),
        ],
    )?;
    tracing::debug!(worker_id, status, "Worker heartbeat recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    use crate::db::init_test_db;

    fn worker(id: &str, status: &str) -> WorkerRegistration {
        let mut capabilities = Map::new();
        capabilities.insert("gpu".into(), json!(false));
        WorkerRegistration {
            worker_id: id.into(),
            capabilities,
            status: status.into(),
            last_heartbeat: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_worker_upsert_overwrites() {
        let pool = init_test_db().unwrap();
        upsert_worker(&pool, &worker("w2", "online")).unwrap();
        upsert_worker(&pool, &worker("w1", "online")).unwrap();

        let mut busy = worker("w1", "busy");
        busy.capabilities.insert("gpu".into(), json!(true));
        busy.last_heartbeat = "2026-01-01T00:05:00Z".into();
        upsert_worker(&pool, &busy).unwrap();

        let workers = list_workers(&pool).unwrap();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0], busy);
        assert_eq!(workers[1].worker_id, "w2");
    }

    #[test]
    fn blank_fields_take_defaults() {
        let pool = init_test_db().unwrap();
        upsert_worker(
            &pool,
            &WorkerRegistration {
                worker_id: "w1".into(),
                capabilities: Map::new(),
                status: " ".into(),
                last_heartbeat: String::new(),
            },
        )
        .unwrap();

        let stored = &list_workers(&pool).unwrap()[0];
        assert_eq!(stored.status, "online");
        assert!(stored.capabilities.is_empty());
        assert!(!stored.last_heartbeat.is_empty());

        assert!(matches!(
            upsert_worker(&pool, &worker("", "online")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn null_capabilities_read_as_empty() {
        let pool = init_test_db().unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO workers VALUES ('w1', 'null', 'online', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        assert!(list_workers(&pool).unwrap()[0].capabilities.is_empty());
    }
}
