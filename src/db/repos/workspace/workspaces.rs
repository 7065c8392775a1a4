use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{bool_column, bool_to_int, now_rfc3339, optional_text_column};
use crate::db::models::{AuthMode, Workspace, WorkspaceMode};
use crate::db::DbPool;
use crate::engine::normalize;
use crate::error::AppError;
use crate::validation::require_valid_id;

// ============================================================================
// Row Mappers
// ============================================================================

/// Stored rows pass through the same normalization as writes, so legacy
/// local rows with stray auth settings still read back auth-disabled.
fn row_to_workspace(row: &Row) -> rusqlite::Result<Workspace> {
    let is_default_local = bool_column(row, "is_default_local")?;
    let mode_raw: String = row.get("mode")?;
    let mode = WorkspaceMode::from_stored(&mode_raw, is_default_local);
    let auth_raw: String = row.get("auth_mode")?;
    let created_at: String = row.get("created_at")?;
    let item = Workspace {
        id: row.get("id")?,
        name: row.get("name")?,
        mode,
        hub_url: optional_text_column(row, "hub_url")?,
        is_default_local,
        created_at: created_at.clone(),
        login_disabled: bool_column(row, "login_disabled")?,
        auth_mode: Some(AuthMode::from_stored(&auth_raw, mode)),
    };
    Ok(normalize::workspace(item, &created_at))
}

fn load(conn: &Connection, id: &str) -> Result<Option<Workspace>, AppError> {
    conn.query_row(
        "SELECT * FROM workspaces WHERE id = ?1",
        params![id],
        row_to_workspace,
    )
    .optional()
    .map_err(AppError::Database)
}

// ============================================================================
// Workspace CRUD
// ============================================================================

/// Default-local workspace first, then oldest first, then by name.
pub fn list(pool: &DbPool) -> Result<Vec<Workspace>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM workspaces
         ORDER BY is_default_local DESC, created_at ASC, lower(name) ASC",
    )?;
    let rows = stmt.query_map([], row_to_workspace)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get(pool: &DbPool, id: &str) -> Result<Option<Workspace>, AppError> {
    let conn = pool.get()?;
    load(&conn, id.trim())
}

pub fn has_remote_workspace(pool: &DbPool) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM workspaces WHERE mode = 'remote'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert or update. `created_at` of an existing row is kept.
pub fn upsert(pool: &DbPool, input: Workspace) -> Result<Workspace, AppError> {
    let item = normalize::workspace(input, &now_rfc3339());
    require_valid_id("workspace id", &item.id)?;
    let auth_mode = item.auth_mode.unwrap_or_else(|| AuthMode::default_for(item.mode));

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO workspaces
         (id, name, mode, hub_url, is_default_local, created_at, login_disabled, auth_mode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name, mode = excluded.mode, hub_url = excluded.hub_url,
            is_default_local = excluded.is_default_local,
            login_disabled = excluded.login_disabled, auth_mode = excluded.auth_mode",
        params![
            item.id,
            item.name,
            item.mode.as_str(),
            item.hub_url,
            bool_to_int(item.is_default_local),
            item.created_at,
            bool_to_int(item.login_disabled),
            auth_mode.as_str(),
        ],
    )?;
    tracing::info!(workspace_id = %item.id, mode = %item.mode, auth_mode = %auth_mode, "Workspace upserted");

    load(&conn, &item.id)?
        .ok_or_else(|| AppError::Internal(format!("Workspace {} vanished after upsert", item.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn workspace(id: &str, name: &str, mode: WorkspaceMode) -> Workspace {
        Workspace {
            id: id.into(),
            name: name.into(),
            mode,
            hub_url: Some("https://hub.example".into()),
            is_default_local: false,
            created_at: String::new(),
            login_disabled: false,
            auth_mode: Some(AuthMode::TokenOnly),
        }
    }

    #[test]
    fn local_upsert_always_disables_auth() {
        let pool = init_test_db().unwrap();
        let saved = upsert(&pool, workspace("local", "Mine", WorkspaceMode::Local)).unwrap();
        assert_eq!(saved.auth_mode, Some(AuthMode::Disabled));
        assert!(saved.hub_url.is_none());
        assert!(saved.login_disabled);
        assert!(saved.is_default_local);
        assert!(!has_remote_workspace(&pool).unwrap());
    }

    #[test]
    fn upsert_keeps_created_at() {
        let pool = init_test_db().unwrap();
        let first = upsert(
            &pool,
            Workspace {
                created_at: "2026-01-01T00:00:00Z".into(),
                ..workspace("ws1", "Team", WorkspaceMode::Remote)
            },
        )
        .unwrap();
        let second = upsert(
            &pool,
            Workspace {
                created_at: "2026-06-01T00:00:00Z".into(),
                name: "Renamed".into(),
                ..workspace("ws1", "Team", WorkspaceMode::Remote)
            },
        )
        .unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.name, "Renamed");
        assert_eq!(second.auth_mode, Some(AuthMode::TokenOnly));
        assert!(has_remote_workspace(&pool).unwrap());
    }

    #[test]
    fn list_puts_default_local_first() {
        let pool = init_test_db().unwrap();
        upsert(
            &pool,
            Workspace {
                created_at: "2026-01-01T00:00:00Z".into(),
                ..workspace("r1", "beta", WorkspaceMode::Remote)
            },
        )
        .unwrap();
        upsert(
            &pool,
            Workspace {
                created_at: "2026-01-01T00:00:00Z".into(),
                ..workspace("r2", "Alpha", WorkspaceMode::Remote)
            },
        )
        .unwrap();
        upsert(
            &pool,
            Workspace {
                created_at: "2026-05-01T00:00:00Z".into(),
                ..workspace("local", "Local", WorkspaceMode::Local)
            },
        )
        .unwrap();

        let ids: Vec<String> = list(&pool).unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["local", "r2", "r1"]);
        assert!(get(&pool, "missing").unwrap().is_none());
    }

    #[test]
    fn blank_id_is_rejected() {
        let pool = init_test_db().unwrap();
        assert!(matches!(
            upsert(&pool, workspace("  ", "x", WorkspaceMode::Remote)),
            Err(AppError::Validation(_))
        ));
    }
}
