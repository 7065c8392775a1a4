use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{bool_column, bool_to_int, optional_text_column};
use crate::db::models::{ConversationMode, Project};
use crate::db::DbPool;
use crate::engine::normalize;
use crate::error::AppError;
use crate::validation::require_valid_id;

// ============================================================================
// Row Mappers
// ============================================================================

pub(crate) fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    let mode: String = row.get("default_mode")?;
    Ok(Project {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        name: row.get("name")?,
        repo_path: row.get("repo_path")?,
        is_git: bool_column(row, "is_git")?,
        default_model_id: optional_text_column(row, "default_model_config_id")?,
        default_mode: ConversationMode::from_stored(&mode),
        current_revision: row.get("current_revision")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn load(conn: &Connection, id: &str) -> Result<Option<Project>, AppError> {
    conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
        .optional()
        .map_err(AppError::Database)
}

// ============================================================================
// Project CRUD
// ============================================================================

/// Newest first. `None` lists every workspace.
pub fn list(pool: &DbPool, workspace_id: Option<&str>) -> Result<Vec<Project>, AppError> {
    let conn = pool.get()?;
    let workspace_id = workspace_id.map(str::trim).filter(|v| !v.is_empty());
    let mut stmt = conn.prepare(
        "SELECT * FROM projects
         WHERE (?1 IS NULL OR workspace_id = ?1)
         ORDER BY created_at DESC, updated_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![workspace_id], row_to_project)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get(pool: &DbPool, id: &str) -> Result<Option<Project>, AppError> {
    let conn = pool.get()?;
    load(&conn, id.trim())
}

pub fn upsert(pool: &DbPool, input: Project) -> Result<Project, AppError> {
    let project = normalize::project(input);
    require_valid_id("project id", &project.id)?;
    require_valid_id("workspace_id", &project.workspace_id)?;

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO projects
         (id, workspace_id, name, repo_path, is_git, default_model_config_id, default_mode,
          current_revision, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
            workspace_id = excluded.workspace_id, name = excluded.name,
            repo_path = excluded.repo_path, is_git = excluded.is_git,
            default_model_config_id = excluded.default_model_config_id,
            default_mode = excluded.default_mode,
            current_revision = excluded.current_revision,
            updated_at = excluded.updated_at",
        params![
            project.id,
            project.workspace_id,
            project.name,
            project.repo_path,
            bool_to_int(project.is_git),
            project.default_model_id,
            project.default_mode.as_str(),
            project.current_revision,
            project.created_at,
            project.updated_at,
        ],
    )?;
    tracing::info!(workspace_id = %project.workspace_id, project_id = %project.id, revision = project.current_revision, "Project upserted");

    load(&conn, &project.id)?
        .ok_or_else(|| AppError::Internal(format!("Project {} vanished after upsert", project.id)))
}

/// Deletes the project and its config together.
pub fn delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let id = id.trim();
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM project_configs WHERE project_id = ?1", params![id])?;
    let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Project {id}")));
    }
    tx.commit()?;
    tracing::info!(project_id = id, "Project deleted");
    Ok(())
}
