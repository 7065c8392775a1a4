use rusqlite::{params, Row};
use serde_json::{Map, Value};

use crate::db::codec::{encode_json, json_column, non_blank, now_rfc3339, optional_text_column};
use crate::db::models::{AuditEntry, NewAuditEntry};
use crate::db::DbPool;
use crate::engine::crypto;
use crate::error::AppError;
use crate::validation::{require_non_empty, require_valid_id};

/// Absent or `null` details read as an empty object.
fn details_column(row: &Row) -> rusqlite::Result<Value> {
    let details: Value = json_column(row, "details_json")?;
    Ok(if details.is_null() {
        Value::Object(Map::new())
    } else {
        details
    })
}

fn row_to_entry(row: &Row) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        actor_user_id: optional_text_column(row, "actor_user_id")?,
        action_key: row.get("action_key")?,
        target_type: row.get("target_type")?,
        target_id: row.get("target_id")?,
        result: row.get("result")?,
        details: details_column(row)?,
        trace_id: row.get("trace_id")?,
        created_at: row.get("created_at")?,
    })
}

/// Audit rows are never updated or deleted.
pub fn append(pool: &DbPool, input: NewAuditEntry) -> Result<AuditEntry, AppError> {
    require_valid_id("workspace_id", &input.workspace_id)?;
    require_non_empty("action_key", &input.action_key)?;

    let details = if input.details.is_null() {
        Value::Object(Map::new())
    } else {
        input.details
    };
    let entry = AuditEntry {
        id: format!("audit_{}", crypto::random_hex(6)),
        workspace_id: input.workspace_id.trim().to_string(),
        actor_user_id: non_blank(input.actor_user_id.as_deref()),
        action_key: input.action_key.trim().to_string(),
        target_type: input.target_type.trim().to_string(),
        target_id: input.target_id.trim().to_string(),
        result: input.result.trim().to_string(),
        details,
        trace_id: input.trace_id.trim().to_string(),
        created_at: now_rfc3339(),
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO audit_logs
         (id, workspace_id, actor_user_id, action_key, target_type, target_id, result,
          details_json, trace_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.id,
            entry.workspace_id,
            entry.actor_user_id,
            entry.action_key,
            entry.target_type,
            entry.target_id,
            entry.result,
            encode_json(&entry.details)?,
            entry.trace_id,
            entry.created_at,
        ],
    )?;
    Ok(entry)
}

/// Newest first.
pub fn list(pool: &DbPool, workspace_id: &str, limit: Option<i64>) -> Result<Vec<AuditEntry>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM audit_logs WHERE workspace_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![workspace_id, limit.unwrap_or(-1)], row_to_entry)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::db::init_test_db;

    fn entry(action: &str) -> NewAuditEntry {
        NewAuditEntry {
            workspace_id: "ws1".into(),
            actor_user_id: Some("u_admin".into()),
            action_key: action.into(),
            target_type: "role".into(),
            target_id: "viewer".into(),
            result: "success".into(),
            details: json!({"enabled": false}),
            trace_id: "tr_1".into(),
        }
    }

    #[test]
    fn test_audit_append_and_list_newest_first() {
        let pool = init_test_db().unwrap();
        let first = append(&pool, entry("admin.roles.manage")).unwrap();
        assert!(first.id.starts_with("audit_"));
        let second = append(
            &pool,
            NewAuditEntry {
                actor_user_id: Some("  ".into()),
                details: serde_json::Value::Null,
                ..entry("admin.users.manage")
            },
        )
        .unwrap();
        assert!(second.actor_user_id.is_none());
        assert_eq!(second.details, json!({}));

        let listed = list(&pool, "ws1", None).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].details, json!({"enabled": false}));

        assert_eq!(list(&pool, "ws1", Some(1)).unwrap().len(), 1);
        assert!(list(&pool, "ws2", None).unwrap().is_empty());
    }

    #[test]
    fn stored_null_or_empty_details_read_as_empty_object() {
        let pool = init_test_db().unwrap();
        let conn = pool.get().unwrap();
        for (id, raw, at) in [("a1", "null", "2026-01-01T00:00:00Z"), ("a2", "", "2026-01-01T00:00:01Z")] {
            conn.execute(
                "INSERT INTO audit_logs
                 (id, workspace_id, action_key, target_type, target_id, result,
                  details_json, trace_id, created_at)
                 VALUES (?1, 'ws1', 'admin.audit.read', 'audit', '', 'success', ?2, '', ?3)",
                params![id, raw, at],
            )
            .unwrap();
        }
        drop(conn);

        let listed = list(&pool, "ws1", None).unwrap();
        assert_eq!(listed.len(), 2);
        for item in listed {
            assert_eq!(item.details, json!({}));
        }
    }

    #[test]
    fn blank_action_is_rejected() {
        let pool = init_test_db().unwrap();
        assert!(matches!(append(&pool, entry(" ")), Err(AppError::Validation(_))));
    }
}
