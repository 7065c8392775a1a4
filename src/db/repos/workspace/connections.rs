use rusqlite::{params, OptionalExtension, Row};

use crate::db::codec::{now_rfc3339, timestamp_or_now};
use crate::db::models::WorkspaceConnection;
use crate::db::DbPool;
use crate::error::AppError;

const DEFAULT_CONNECTION_STATUS: &str = "connected";

fn row_to_connection(row: &Row) -> rusqlite::Result<WorkspaceConnection> {
    Ok(WorkspaceConnection {
        workspace_id: row.get("workspace_id")?,
        hub_url: row.get("hub_url")?,
        username: row.get("username")?,
        connection_status: row.get("connection_status")?,
        connected_at: row.get("connected_at")?,
    })
}

pub fn get(pool: &DbPool, workspace_id: &str) -> Result<Option<WorkspaceConnection>, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM workspace_connections WHERE workspace_id = ?1",
        params![workspace_id.trim()],
        row_to_connection,
    )
    .optional()
    .map_err(AppError::Database)
}

/// Record a (re)connection. A blank workspace id is silently ignored.
pub fn upsert(pool: &DbPool, input: WorkspaceConnection) -> Result<(), AppError> {
    let workspace_id = input.workspace_id.trim();
    if workspace_id.is_empty() {
        return Ok(());
    }
    let status = match input.connection_status.trim() {
        "" => DEFAULT_CONNECTION_STATUS,
        other => other,
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO workspace_connections
         (workspace_id, hub_url, username, connection_status, connected_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(workspace_id) DO UPDATE SET
            hub_url = excluded.hub_url, username = excluded.username,
            connection_status = excluded.connection_status,
            connected_at = excluded.connected_at, updated_at = excluded.updated_at",
        params![
            workspace_id,
            input.hub_url.trim(),
            input.username.trim(),
            status,
            timestamp_or_now(&input.connected_at),
            now_rfc3339(),
        ],
    )?;
    tracing::debug!(workspace_id, status, "Workspace connection recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[test]
    fn test_connection_upsert_defaults() {
        let pool = init_test_db().unwrap();
        upsert(
            &pool,
            WorkspaceConnection {
                workspace_id: "ws1".into(),
                hub_url: " https://hub.example ".into(),
                username: "alice".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let saved = get(&pool, "ws1").unwrap().unwrap();
        assert_eq!(saved.connection_status, "connected");
        assert_eq!(saved.hub_url, "https://hub.example");
        assert!(!saved.connected_at.is_empty());

        upsert(
            &pool,
            WorkspaceConnection {
                workspace_id: "ws1".into(),
                hub_url: "https://hub.example".into(),
                username: "bob".into(),
                connection_status: "degraded".into(),
                connected_at: "2026-02-02T00:00:00Z".into(),
            },
        )
        .unwrap();
        let saved = get(&pool, "ws1").unwrap().unwrap();
        assert_eq!(saved.username, "bob");
        assert_eq!(saved.connection_status, "degraded");
        assert_eq!(saved.connected_at, "2026-02-02T00:00:00Z");
    }

    #[test]
    fn blank_workspace_is_a_no_op() {
        let pool = init_test_db().unwrap();
        upsert(&pool, WorkspaceConnection::default()).unwrap();
        assert!(get(&pool, "").unwrap().is_none());
    }
}
