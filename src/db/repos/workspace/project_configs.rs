use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{encode_id_list, id_list_column, optional_text_column};
use crate::db::models::{ProjectConfig, WorkspaceProjectConfigItem};
use crate::db::repos::workspace::projects;
use crate::db::DbPool;
use crate::engine::normalize;
use crate::error::AppError;
use crate::validation::require_valid_id;

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_config(row: &Row) -> rusqlite::Result<ProjectConfig> {
    Ok(normalize::project_config(ProjectConfig {
        project_id: row.get("project_id")?,
        model_ids: id_list_column(row, "model_config_ids_json")?,
        default_model_id: optional_text_column(row, "default_model_config_id")?,
        rule_ids: id_list_column(row, "rule_ids_json")?,
        skill_ids: id_list_column(row, "skill_ids_json")?,
        mcp_ids: id_list_column(row, "mcp_ids_json")?,
        updated_at: row.get("updated_at")?,
    }))
}

fn load(conn: &Connection, project_id: &str) -> Result<Option<ProjectConfig>, AppError> {
    conn.query_row(
        "SELECT * FROM project_configs WHERE project_id = ?1",
        params![project_id],
        row_to_config,
    )
    .optional()
    .map_err(AppError::Database)
}

// ============================================================================
// Project config CRUD
// ============================================================================

pub fn get(pool: &DbPool, project_id: &str) -> Result<Option<ProjectConfig>, AppError> {
    let conn = pool.get()?;
    load(&conn, project_id.trim())
}

pub fn upsert(
    pool: &DbPool,
    workspace_id: &str,
    input: ProjectConfig,
) -> Result<ProjectConfig, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    let config = normalize::project_config(input);
    require_valid_id("project_id", &config.project_id)?;

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO project_configs
         (project_id, workspace_id, model_config_ids_json, default_model_config_id,
          rule_ids_json, skill_ids_json, mcp_ids_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(project_id) DO UPDATE SET
            workspace_id = excluded.workspace_id,
            model_config_ids_json = excluded.model_config_ids_json,
            default_model_config_id = excluded.default_model_config_id,
            rule_ids_json = excluded.rule_ids_json,
            skill_ids_json = excluded.skill_ids_json,
            mcp_ids_json = excluded.mcp_ids_json,
            updated_at = excluded.updated_at",
        params![
            config.project_id,
            workspace_id.trim(),
            encode_id_list(&config.model_ids)?,
            config.default_model_id,
            encode_id_list(&config.rule_ids)?,
            encode_id_list(&config.skill_ids)?,
            encode_id_list(&config.mcp_ids)?,
            config.updated_at,
        ],
    )?;
    tracing::info!(
        workspace_id,
        project_id = %config.project_id,
        models = config.model_ids.len(),
        "Project config saved"
    );
    Ok(config)
}

/// The saved config, or one built from the project's default model.
pub fn resolve(pool: &DbPool, project_id: &str) -> Result<ProjectConfig, AppError> {
    let project_id = project_id.trim();
    let conn = pool.get()?;
    if let Some(config) = load(&conn, project_id)? {
        return Ok(config);
    }
    let project = projects::load(&conn, project_id)?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id}")))?;
    Ok(normalize::default_project_config(
        &project.id,
        project.default_model_id.as_deref(),
        &project.updated_at,
    ))
}

/// Every project of the workspace with its effective config, by name.
pub fn list_for_workspace(
    pool: &DbPool,
    workspace_id: &str,
) -> Result<Vec<WorkspaceProjectConfigItem>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT p.id AS p_id, p.name AS p_name,
                p.default_model_config_id AS p_default_model, p.updated_at AS p_updated_at,
                c.project_id, c.model_config_ids_json, c.default_model_config_id,
                c.rule_ids_json, c.skill_ids_json, c.mcp_ids_json, c.updated_at
         FROM projects p
         LEFT JOIN project_configs c ON c.project_id = p.id
         WHERE p.workspace_id = ?1
         ORDER BY lower(p.name) ASC, p.id ASC",
    )?;
    let rows = stmt.query_map(params![workspace_id.trim()], |row| {
        let project_id: String = row.get("p_id")?;
        let configured: Option<String> = row.get("project_id")?;
        let config = match configured {
            Some(_) => row_to_config(row)?,
            None => {
                let default_model: Option<String> = optional_text_column(row, "p_default_model")?;
                let updated_at: String = row.get("p_updated_at")?;
                normalize::default_project_config(&project_id, default_model.as_deref(), &updated_at)
            }
        };
        Ok(WorkspaceProjectConfigItem {
            project_name: row.get("p_name")?,
            project_id,
            config,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::Project;

    fn seed_project(pool: &DbPool, id: &str, name: &str, default_model: Option<&str>) {
        projects::upsert(
            pool,
            Project {
                id: id.into(),
                workspace_id: "ws1".into(),
                name: name.into(),
                default_model_id: default_model.map(str::to_string),
                ..Project::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn default_model_joins_model_ids_on_save() {
        let pool = init_test_db().unwrap();
        let saved = upsert(
            &pool,
            "ws1",
            ProjectConfig {
                project_id: "p1".into(),
                default_model_id: Some("m1".into()),
                rule_ids: vec!["r1".into(), " r1".into(), "".into()],
                ..ProjectConfig::default()
            },
        )
        .unwrap();
        assert_eq!(saved.model_ids, vec!["m1"]);
        assert_eq!(saved.rule_ids, vec!["r1"]);

        let read = get(&pool, "p1").unwrap().unwrap();
        assert_eq!(read, saved);
    }

    #[test]
    fn resolve_falls_back_to_project_default() {
        let pool = init_test_db().unwrap();
        seed_project(&pool, "p1", "One", Some("m7"));

        let resolved = resolve(&pool, "p1").unwrap();
        assert_eq!(resolved.model_ids, vec!["m7"]);
        assert_eq!(resolved.default_model_id.as_deref(), Some("m7"));

        assert!(resolve(&pool, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn workspace_listing_is_name_ordered_with_fallbacks() {
        let pool = init_test_db().unwrap();
        seed_project(&pool, "p1", "beta", Some("m1"));
        seed_project(&pool, "p2", "Alpha", None);
        upsert(
            &pool,
            "ws1",
            ProjectConfig {
                project_id: "p1".into(),
                model_ids: vec!["m2".into()],
                mcp_ids: vec!["mcp1".into()],
                ..ProjectConfig::default()
            },
        )
        .unwrap();

        let items = list_for_workspace(&pool, "ws1").unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.project_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert!(items[0].config.model_ids.is_empty());
        assert_eq!(items[0].config.project_id, "p2");
        assert_eq!(items[1].config.model_ids, vec!["m2"]);
        assert_eq!(items[1].config.mcp_ids, vec!["mcp1"]);
    }
}
