use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::codec::{encode_json, json_column, now_rfc3339};
use crate::db::models::{AgentDisplayConfig, AgentExecutionConfig, WorkspaceAgentConfig};
use crate::db::DbPool;
use crate::engine::normalize;
use crate::error::AppError;
use crate::validation::require_valid_id;

/// Shape of `config_json`; workspace id and timestamp live in their own columns.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAgentConfig {
    #[serde(default)]
    execution: AgentExecutionConfig,
    #[serde(default)]
    display: AgentDisplayConfig,
}

fn row_to_config(row: &Row) -> rusqlite::Result<WorkspaceAgentConfig> {
    let stored: StoredAgentConfig = json_column(row, "config_json")?;
    let workspace_id: String = row.get("workspace_id")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(normalize::agent_config(
        &workspace_id,
        WorkspaceAgentConfig {
            workspace_id: workspace_id.clone(),
            execution: stored.execution,
            display: stored.display,
            updated_at: updated_at.clone(),
        },
        &updated_at,
    ))
}

fn load(conn: &Connection, workspace_id: &str) -> Result<Option<WorkspaceAgentConfig>, AppError> {
    conn.query_row(
        "SELECT * FROM workspace_agent_configs WHERE workspace_id = ?1",
        params![workspace_id],
        row_to_config,
    )
    .optional()
    .map_err(AppError::Database)
}

fn write(conn: &Connection, config: &WorkspaceAgentConfig) -> Result<(), AppError> {
    let stored = StoredAgentConfig {
        execution: config.execution.clone(),
        display: config.display.clone(),
    };
    conn.execute(
        "INSERT INTO workspace_agent_configs (workspace_id, config_json, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(workspace_id) DO UPDATE SET
            config_json = excluded.config_json, updated_at = excluded.updated_at",
        params![config.workspace_id, encode_json(&stored)?, config.updated_at],
    )?;
    Ok(())
}

pub fn get(pool: &DbPool, workspace_id: &str) -> Result<Option<WorkspaceAgentConfig>, AppError> {
    let conn = pool.get()?;
    load(&conn, workspace_id.trim())
}

pub fn upsert(
    pool: &DbPool,
    workspace_id: &str,
    input: WorkspaceAgentConfig,
) -> Result<WorkspaceAgentConfig, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    let config = normalize::agent_config(workspace_id, input, &now_rfc3339());
    let conn = pool.get()?;
    write(&conn, &config)?;
    tracing::info!(
        workspace_id = %config.workspace_id,
        max_model_turns = config.execution.max_model_turns,
        "Workspace agent config saved"
    );
    Ok(config)
}

/// Read the config, creating it with defaults on first access.
pub fn ensure(pool: &DbPool, workspace_id: &str) -> Result<WorkspaceAgentConfig, AppError> {
    let workspace_id = workspace_id.trim();
    require_valid_id("workspace_id", workspace_id)?;

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    if let Some(existing) = load(&tx, workspace_id)? {
        return Ok(existing);
    }
    let config = normalize::default_agent_config(workspace_id, &now_rfc3339());
    write(&tx, &config)?;
    tx.commit()?;
    tracing::debug!(workspace_id, "Created default workspace agent config");
    Ok(config)
}
