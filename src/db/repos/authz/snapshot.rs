use std::collections::BTreeSet;

use rusqlite::params;

use crate::db::codec::now_rfc3339;
use crate::db::models::{PermissionSnapshot, Role};
use crate::db::repos::authz::catalog::load_menu_visibility;
use crate::db::DbPool;
use crate::engine::visibility;
use crate::error::AppError;

/// Effective permissions and UI visibility for `role` in `workspace_id`.
///
/// Grants count only while the role record is enabled. ABAC policies are not
/// consulted here.
pub fn build_permission_snapshot(
    pool: &DbPool,
    workspace_id: &str,
    role: Role,
) -> Result<PermissionSnapshot, AppError> {
    let conn = pool.get()?;

    let granted: BTreeSet<String> = {
        let mut stmt = conn.prepare(
            "SELECT g.permission_key FROM role_grants g
             JOIN roles r ON r.workspace_id = g.workspace_id AND r.role_key = g.role_key
             WHERE g.workspace_id = ?1 AND g.role_key = ?2 AND r.enabled = 1",
        )?;
        let rows = stmt.query_map(params![workspace_id, role.as_str()], |row| row.get(0))?;
        rows.collect::<Result<BTreeSet<_>, _>>()?
    };

    let menu_visibility = load_menu_visibility(&conn, workspace_id, role)?;

    let catalog_keys: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT permission_key FROM permissions WHERE workspace_id = ?1 ORDER BY permission_key ASC",
        )?;
        let rows = stmt.query_map(params![workspace_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    Ok(visibility::build_snapshot(
        role,
        granted,
        menu_visibility,
        &catalog_keys,
        now_rfc3339(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::Visibility;
    use crate::db::repos::authz::{catalog, seed::ensure_workspace_seeds};
    use crate::engine::visibility::POLICY_VERSION;

    #[test]
    fn viewer_never_gets_admin_actions() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();

        let snapshot = build_permission_snapshot(&pool, "ws1", Role::Viewer).unwrap();
        assert_eq!(snapshot.role, Role::Viewer);
        assert_eq!(snapshot.policy_version, POLICY_VERSION);
        assert_eq!(
            snapshot.permissions,
            vec!["conversation.read", "project.read", "resource.read"]
        );
        for (key, vis) in &snapshot.action_visibility {
            if key.starts_with("admin.") {
                assert_ne!(*vis, Visibility::Enabled, "{key}");
            }
        }
        assert_eq!(snapshot.action_visibility["admin.audit.read"], Visibility::Readonly);
        assert_eq!(snapshot.action_visibility["project.write"], Visibility::Disabled);
        assert_eq!(snapshot.menu_visibility["remote_members_roles"], Visibility::Hidden);
    }

    #[test]
    fn admin_gets_every_known_action() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();

        let snapshot = build_permission_snapshot(&pool, "ws1", Role::Admin).unwrap();
        assert_eq!(snapshot.permissions, vec!["*"]);
        assert_eq!(snapshot.action_visibility.len(), 24);
        assert!(snapshot
            .action_visibility
            .values()
            .all(|v| *v == Visibility::Enabled));
        assert!(snapshot.menu_visibility.values().all(|v| *v == Visibility::Enabled));
    }

    #[test]
    fn disabled_role_contributes_no_grants() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();
        catalog::set_role_enabled(&pool, "ws1", Role::Developer, false).unwrap();

        let snapshot = build_permission_snapshot(&pool, "ws1", Role::Developer).unwrap();
        assert!(snapshot.permissions.is_empty());
        assert!(snapshot
            .action_visibility
            .values()
            .all(|v| *v != Visibility::Enabled));
    }

    #[test]
    fn unseeded_workspace_yields_empty_snapshot() {
        let pool = init_test_db().unwrap();
        let snapshot = build_permission_snapshot(&pool, "nowhere", Role::Admin).unwrap();
        assert!(snapshot.permissions.is_empty());
        assert!(snapshot.action_visibility.is_empty());
        assert!(snapshot.menu_visibility.is_empty());
    }
}
