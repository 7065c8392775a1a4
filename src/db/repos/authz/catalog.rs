use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{bool_column, bool_to_int, now_rfc3339, sanitize_id_list};
use crate::db::models::{
    MenuDefinition, PermissionDefinition, Role, RoleDefinition, RoleMenuVisibility, Visibility,
};
use crate::db::DbPool;
use crate::error::AppError;
use crate::validation::{require_non_empty, require_valid_id};

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_role(row: &Row) -> rusqlite::Result<RoleDefinition> {
    let key: String = row.get("role_key")?;
    Ok(RoleDefinition {
        key: Role::from_stored(&key),
        name: row.get("name")?,
        permissions: Vec::new(),
        enabled: bool_column(row, "enabled")?,
    })
}

fn row_to_permission(row: &Row) -> rusqlite::Result<PermissionDefinition> {
    Ok(PermissionDefinition {
        key: row.get("permission_key")?,
        label: row.get("label")?,
        enabled: bool_column(row, "enabled")?,
    })
}

fn row_to_menu(row: &Row) -> rusqlite::Result<MenuDefinition> {
    Ok(MenuDefinition {
        key: row.get("menu_key")?,
        label: row.get("label")?,
        enabled: bool_column(row, "enabled")?,
    })
}

// ============================================================================
// Connection-level helpers (shared with seeding)
// ============================================================================

fn role_grants(conn: &Connection, workspace_id: &str, role: Role) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT permission_key FROM role_grants
         WHERE workspace_id = ?1 AND role_key = ?2
         ORDER BY permission_key ASC",
    )?;
    let rows = stmt.query_map(params![workspace_id, role.as_str()], |row| row.get(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

fn load_role(
    conn: &Connection,
    workspace_id: &str,
    role: Role,
) -> Result<Option<RoleDefinition>, AppError> {
    let found = conn
        .query_row(
            "SELECT * FROM roles WHERE workspace_id = ?1 AND role_key = ?2",
            params![workspace_id, role.as_str()],
            row_to_role,
        )
        .optional()?;
    match found {
        Some(mut item) => {
            item.permissions = role_grants(conn, workspace_id, role)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Upsert the role row and replace its grant set. Caller owns the transaction.
pub(crate) fn write_role(
    conn: &Connection,
    workspace_id: &str,
    role: &RoleDefinition,
    now: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO roles (workspace_id, role_key, name, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(workspace_id, role_key) DO UPDATE SET
            name = excluded.name, enabled = excluded.enabled, updated_at = excluded.updated_at",
        params![workspace_id, role.key.as_str(), role.name, bool_to_int(role.enabled), now],
    )?;
    conn.execute(
        "DELETE FROM role_grants WHERE workspace_id = ?1 AND role_key = ?2",
        params![workspace_id, role.key.as_str()],
    )?;
    for permission_key in sanitize_id_list(&role.permissions) {
        conn.execute(
            "INSERT OR IGNORE INTO role_grants (workspace_id, role_key, permission_key)
             VALUES (?1, ?2, ?3)",
            params![workspace_id, role.key.as_str(), permission_key],
        )?;
    }
    Ok(())
}

/// Seeding refreshes the label only; operator changes to `enabled` survive.
pub(crate) fn write_permission(
    conn: &Connection,
    workspace_id: &str,
    item: &PermissionDefinition,
    now: &str,
    refresh_enabled: bool,
) -> Result<(), AppError> {
    let sql = if refresh_enabled {
        "INSERT INTO permissions (workspace_id, permission_key, label, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(workspace_id, permission_key) DO UPDATE SET
            label = excluded.label, enabled = excluded.enabled, updated_at = excluded.updated_at"
    } else {
        "INSERT INTO permissions (workspace_id, permission_key, label, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(workspace_id, permission_key) DO UPDATE SET
            label = excluded.label, updated_at = excluded.updated_at"
    };
    conn.execute(
        sql,
        params![workspace_id, item.key.trim(), item.label.trim(), bool_to_int(item.enabled), now],
    )?;
    Ok(())
}

pub(crate) fn write_menu(
    conn: &Connection,
    workspace_id: &str,
    item: &MenuDefinition,
    now: &str,
    refresh_enabled: bool,
) -> Result<(), AppError> {
    let sql = if refresh_enabled {
        "INSERT INTO menus (workspace_id, menu_key, label, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(workspace_id, menu_key) DO UPDATE SET
            label = excluded.label, enabled = excluded.enabled, updated_at = excluded.updated_at"
    } else {
        "INSERT INTO menus (workspace_id, menu_key, label, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(workspace_id, menu_key) DO UPDATE SET
            label = excluded.label, updated_at = excluded.updated_at"
    };
    conn.execute(
        sql,
        params![workspace_id, item.key.trim(), item.label.trim(), bool_to_int(item.enabled), now],
    )?;
    Ok(())
}

pub(crate) fn write_menu_visibility(
    conn: &Connection,
    workspace_id: &str,
    role: Role,
    items: &BTreeMap<String, Visibility>,
    now: &str,
) -> Result<(), AppError> {
    for (menu_key, visibility) in items {
        conn.execute(
            "INSERT INTO permission_visibility
             (workspace_id, role_key, menu_key, visibility, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(workspace_id, role_key, menu_key) DO UPDATE SET
                visibility = excluded.visibility, updated_at = excluded.updated_at",
            params![workspace_id, role.as_str(), menu_key, visibility.as_str(), now],
        )?;
    }
    Ok(())
}

pub(crate) fn load_menu_visibility(
    conn: &Connection,
    workspace_id: &str,
    role: Role,
) -> Result<BTreeMap<String, Visibility>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT menu_key, visibility FROM permission_visibility
         WHERE workspace_id = ?1 AND role_key = ?2",
    )?;
    let rows = stmt.query_map(params![workspace_id, role.as_str()], |row| {
        let menu_key: String = row.get(0)?;
        let visibility: String = row.get(1)?;
        Ok((menu_key, Visibility::from_stored(&visibility)))
    })?;
    rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(AppError::Database)
}

// ============================================================================
// Roles
// ============================================================================

pub fn list_roles(pool: &DbPool, workspace_id: &str) -> Result<Vec<RoleDefinition>, AppError> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT * FROM roles WHERE workspace_id = ?1 ORDER BY role_key ASC")?;
    let rows = stmt.query_map(params![workspace_id], row_to_role)?;
    let mut roles = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    for role in roles.iter_mut() {
        role.permissions = role_grants(&conn, workspace_id, role.key)?;
    }
    Ok(roles)
}

pub fn upsert_role(
    pool: &DbPool,
    workspace_id: &str,
    input: RoleDefinition,
) -> Result<RoleDefinition, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    let mut role = input;
    role.name = role.name.trim().to_string();
    if role.name.is_empty() {
        role.name = role.key.as_str().to_string();
    }

    let now = now_rfc3339();
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    write_role(&tx, workspace_id, &role, &now)?;
    let saved = load_role(&tx, workspace_id, role.key)?
        .ok_or_else(|| AppError::Internal(format!("Role {} vanished after upsert", role.key)))?;
    tx.commit()?;

    tracing::info!(workspace_id, role = %saved.key, grants = saved.permissions.len(), "Role upserted");
    Ok(saved)
}

pub fn set_role_enabled(
    pool: &DbPool,
    workspace_id: &str,
    role: Role,
    enabled: bool,
) -> Result<RoleDefinition, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE roles SET enabled = ?1, updated_at = ?2 WHERE workspace_id = ?3 AND role_key = ?4",
        params![bool_to_int(enabled), now_rfc3339(), workspace_id, role.as_str()],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Role {role}")));
    }
    load_role(&conn, workspace_id, role)?.ok_or_else(|| AppError::NotFound(format!("Role {role}")))
}

/// Removes the role together with its grants and menu visibility.
pub fn delete_role(pool: &DbPool, workspace_id: &str, role: Role) -> Result<bool, AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM role_grants WHERE workspace_id = ?1 AND role_key = ?2",
        params![workspace_id, role.as_str()],
    )?;
    tx.execute(
        "DELETE FROM permission_visibility WHERE workspace_id = ?1 AND role_key = ?2",
        params![workspace_id, role.as_str()],
    )?;
    let rows = tx.execute(
        "DELETE FROM roles WHERE workspace_id = ?1 AND role_key = ?2",
        params![workspace_id, role.as_str()],
    )?;
    tx.commit()?;
    Ok(rows > 0)
}

// ============================================================================
// Permissions
// ============================================================================

pub fn list_permissions(
    pool: &DbPool,
    workspace_id: &str,
) -> Result<Vec<PermissionDefinition>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM permissions WHERE workspace_id = ?1 ORDER BY permission_key ASC",
    )?;
    let rows = stmt.query_map(params![workspace_id], row_to_permission)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn upsert_permission(
    pool: &DbPool,
    workspace_id: &str,
    input: PermissionDefinition,
) -> Result<PermissionDefinition, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    require_non_empty("permission key", &input.key)?;
    let conn = pool.get()?;
    write_permission(&conn, workspace_id, &input, &now_rfc3339(), true)?;
    conn.query_row(
        "SELECT * FROM permissions WHERE workspace_id = ?1 AND permission_key = ?2",
        params![workspace_id, input.key.trim()],
        row_to_permission,
    )
    .map_err(AppError::Database)
}

/// Deleting a permission also strips it from every role's grant set.
pub fn delete_permission(
    pool: &DbPool,
    workspace_id: &str,
    permission_key: &str,
) -> Result<bool, AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM role_grants WHERE workspace_id = ?1 AND permission_key = ?2",
        params![workspace_id, permission_key],
    )?;
    let rows = tx.execute(
        "DELETE FROM permissions WHERE workspace_id = ?1 AND permission_key = ?2",
        params![workspace_id, permission_key],
    )?;
    tx.commit()?;
    Ok(rows > 0)
}

// ============================================================================
// Menus
// ============================================================================

pub fn list_menus(pool: &DbPool, workspace_id: &str) -> Result<Vec<MenuDefinition>, AppError> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT * FROM menus WHERE workspace_id = ?1 ORDER BY menu_key ASC")?;
    let rows = stmt.query_map(params![workspace_id], row_to_menu)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn upsert_menu(
    pool: &DbPool,
    workspace_id: &str,
    input: MenuDefinition,
) -> Result<MenuDefinition, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    require_non_empty("menu key", &input.key)?;
    let conn = pool.get()?;
    write_menu(&conn, workspace_id, &input, &now_rfc3339(), true)?;
    conn.query_row(
        "SELECT * FROM menus WHERE workspace_id = ?1 AND menu_key = ?2",
        params![workspace_id, input.key.trim()],
        row_to_menu,
    )
    .map_err(AppError::Database)
}

pub fn delete_menu(pool: &DbPool, workspace_id: &str, menu_key: &str) -> Result<bool, AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM permission_visibility WHERE workspace_id = ?1 AND menu_key = ?2",
        params![workspace_id, menu_key],
    )?;
    let rows = tx.execute(
        "DELETE FROM menus WHERE workspace_id = ?1 AND menu_key = ?2",
        params![workspace_id, menu_key],
    )?;
    tx.commit()?;
    Ok(rows > 0)
}

// ============================================================================
// Menu visibility
// ============================================================================

pub fn get_menu_visibility(
    pool: &DbPool,
    workspace_id: &str,
    role: Role,
) -> Result<RoleMenuVisibility, AppError> {
    let conn = pool.get()?;
    Ok(RoleMenuVisibility {
        role_key: role,
        items: load_menu_visibility(&conn, workspace_id, role)?,
    })
}

/// Replace the role's whole visibility map.
pub fn set_menu_visibility(
    pool: &DbPool,
    workspace_id: &str,
    role: Role,
    items: BTreeMap<String, Visibility>,
) -> Result<RoleMenuVisibility, AppError> {
    require_valid_id("workspace_id", workspace_id)?;
    let items: BTreeMap<String, Visibility> = items
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v))
        .filter(|(k, _)| !k.is_empty())
        .collect();

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM permission_visibility WHERE workspace_id = ?1 AND role_key = ?2",
        params![workspace_id, role.as_str()],
    )?;
    write_menu_visibility(&tx, workspace_id, role, &items, &now_rfc3339())?;
    tx.commit()?;

    Ok(RoleMenuVisibility {
        role_key: role,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn role(key: Role, permissions: &[&str]) -> RoleDefinition {
        RoleDefinition {
            key,
            name: String::new(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            enabled: true,
        }
    }

    #[test]
    fn test_role_upsert_replaces_grants() {
        let pool = init_test_db().unwrap();
        let saved = upsert_role(&pool, "ws1", role(Role::Viewer, &["b.read", "a.read", "a.read"])).unwrap();
        assert_eq!(saved.name, "viewer");
        assert_eq!(saved.permissions, vec!["a.read", "b.read"]);

        let replaced = upsert_role(&pool, "ws1", role(Role::Viewer, &["c.read"])).unwrap();
        assert_eq!(replaced.permissions, vec!["c.read"]);

        let disabled = set_role_enabled(&pool, "ws1", Role::Viewer, false).unwrap();
        assert!(!disabled.enabled);
        assert_eq!(disabled.permissions, vec!["c.read"]);

        assert!(set_role_enabled(&pool, "ws1", Role::Admin, true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_role_delete_cascades() {
        let pool = init_test_db().unwrap();
        upsert_role(&pool, "ws1", role(Role::Approver, &["share.approve"])).unwrap();
        let mut items = BTreeMap::new();
        items.insert("main".to_string(), Visibility::Enabled);
        set_menu_visibility(&pool, "ws1", Role::Approver, items).unwrap();

        assert!(delete_role(&pool, "ws1", Role::Approver).unwrap());
        assert!(list_roles(&pool, "ws1").unwrap().is_empty());
        assert!(get_menu_visibility(&pool, "ws1", Role::Approver).unwrap().items.is_empty());
        assert!(!delete_role(&pool, "ws1", Role::Approver).unwrap());
    }

    #[test]
    fn test_permission_delete_strips_grants() {
        let pool = init_test_db().unwrap();
        upsert_permission(
            &pool,
            "ws1",
            PermissionDefinition {
                key: "project.write".into(),
                label: "Write".into(),
                enabled: true,
            },
        )
        .unwrap();
        upsert_role(&pool, "ws1", role(Role::Developer, &["project.write", "project.read"])).unwrap();

        assert!(delete_permission(&pool, "ws1", "project.write").unwrap());
        assert!(list_permissions(&pool, "ws1").unwrap().is_empty());
        let roles = list_roles(&pool, "ws1").unwrap();
        assert_eq!(roles[0].permissions, vec!["project.read"]);
    }

    #[test]
    fn test_menu_crud_and_visibility_replace() {
        let pool = init_test_db().unwrap();
        for key in ["main", "settings_theme"] {
            upsert_menu(
                &pool,
                "ws1",
                MenuDefinition {
                    key: key.into(),
                    label: key.into(),
                    enabled: true,
                },
            )
            .unwrap();
        }
        let updated = upsert_menu(
            &pool,
            "ws1",
            MenuDefinition {
                key: "main".into(),
                label: "Home".into(),
                enabled: false,
            },
        )
        .unwrap();
        assert_eq!(updated.label, "Home");
        assert!(!updated.enabled);

        let mut first = BTreeMap::new();
        first.insert("main".to_string(), Visibility::Enabled);
        first.insert("settings_theme".to_string(), Visibility::Readonly);
        set_menu_visibility(&pool, "ws1", Role::Viewer, first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("main".to_string(), Visibility::Hidden);
        set_menu_visibility(&pool, "ws1", Role::Viewer, second).unwrap();

        let visibility = get_menu_visibility(&pool, "ws1", Role::Viewer).unwrap();
        assert_eq!(visibility.items.len(), 1);
        assert_eq!(visibility.items["main"], Visibility::Hidden);

        assert!(delete_menu(&pool, "ws1", "main").unwrap());
        assert!(get_menu_visibility(&pool, "ws1", Role::Viewer).unwrap().items.is_empty());
        assert_eq!(list_menus(&pool, "ws1").unwrap().len(), 1);
    }
}
