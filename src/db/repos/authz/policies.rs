use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{bool_column, bool_to_int, encode_json, json_column, now_rfc3339};
use crate::db::models::{AbacEffect, AbacPolicy};
use crate::db::DbPool;
use crate::engine::crypto;
use crate::error::AppError;
use crate::validation::require_valid_id;

const POLICY_ID_PREFIX: &str = "policy_";
const POLICY_ID_BYTES: usize = 6;
const DEFAULT_PRIORITY: i64 = 100;

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_policy(row: &Row) -> rusqlite::Result<AbacPolicy> {
    let effect: String = row.get("effect")?;
    Ok(AbacPolicy {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        name: row.get("name")?,
        effect: AbacEffect::from_stored(&effect),
        priority: row.get("priority")?,
        enabled: bool_column(row, "enabled")?,
        subject_expr: json_column(row, "subject_expr")?,
        resource_expr: json_column(row, "resource_expr")?,
        action_expr: json_column(row, "action_expr")?,
        context_expr: json_column(row, "context_expr")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

// ============================================================================
// Connection-level helpers (shared with seeding)
// ============================================================================

/// With `overwrite` false an existing row with the same id is left untouched.
/// A row owned by another workspace is never overwritten.
pub(crate) fn write_policy(
    conn: &Connection,
    policy: &AbacPolicy,
    now: &str,
    overwrite: bool,
) -> Result<(), AppError> {
    let sql = if overwrite {
        "INSERT INTO abac_policies
         (id, workspace_id, name, effect, priority, enabled,
          subject_expr, resource_expr, action_expr, context_expr, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            effect = excluded.effect, priority = excluded.priority,
            enabled = excluded.enabled, subject_expr = excluded.subject_expr,
            resource_expr = excluded.resource_expr, action_expr = excluded.action_expr,
            context_expr = excluded.context_expr, updated_at = excluded.updated_at
         WHERE abac_policies.workspace_id = excluded.workspace_id"
    } else {
        "INSERT OR IGNORE INTO abac_policies
         (id, workspace_id, name, effect, priority, enabled,
          subject_expr, resource_expr, action_expr, context_expr, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)"
    };
    conn.execute(
        sql,
        params![
            policy.id,
            policy.workspace_id,
            policy.name,
            policy.effect.as_str(),
            policy.priority,
            bool_to_int(policy.enabled),
            encode_json(&policy.subject_expr)?,
            encode_json(&policy.resource_expr)?,
            encode_json(&policy.action_expr)?,
            encode_json(&policy.context_expr)?,
            now,
        ],
    )?;
    Ok(())
}

fn load(conn: &Connection, id: &str) -> Result<Option<AbacPolicy>, AppError> {
    conn.query_row(
        "SELECT * FROM abac_policies WHERE id = ?1",
        params![id],
        row_to_policy,
    )
    .optional()
    .map_err(AppError::Database)
}

// ============================================================================
// ABAC policy CRUD
// ============================================================================

/// Evaluation order: lowest priority first, ties broken by id.
pub fn list(pool: &DbPool, workspace_id: &str) -> Result<Vec<AbacPolicy>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM abac_policies WHERE workspace_id = ?1 ORDER BY priority ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![workspace_id], row_to_policy)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<AbacPolicy, AppError> {
    let conn = pool.get()?;
    load(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("Policy {id}")))
}

pub fn upsert(pool: &DbPool, workspace_id: &str, input: AbacPolicy) -> Result<AbacPolicy, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    let mut policy = input;
    policy.id = policy.id.trim().to_string();
    if policy.id.is_empty() {
        policy.id = format!("{POLICY_ID_PREFIX}{}", crypto::random_hex(POLICY_ID_BYTES));
    }
    policy.workspace_id = workspace_id.trim().to_string();
    policy.name = policy.name.trim().to_string();
    if policy.priority == 0 {
        policy.priority = DEFAULT_PRIORITY;
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    if let Some(existing) = load(&tx, &policy.id)? {
        if existing.workspace_id != policy.workspace_id {
            return Err(AppError::Validation(format!(
                "Policy {} belongs to another workspace",
                policy.id
            )));
        }
    }
    write_policy(&tx, &policy, &now_rfc3339(), true)?;
    let saved = load(&tx, &policy.id)?
        .ok_or_else(|| AppError::Internal(format!("Policy {} vanished after upsert", policy.id)))?;
    tx.commit()?;
    tracing::info!(workspace_id, policy_id = %policy.id, effect = %policy.effect, priority = policy.priority, "ABAC policy upserted");
    Ok(saved)
}

pub fn delete(pool: &DbPool, workspace_id: &str, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM abac_policies WHERE workspace_id = ?1 AND id = ?2",
        params![workspace_id.trim(), id.trim()],
    )?;
    Ok(rows > 0)
}
