use crate::db::codec::now_rfc3339;
use crate::db::repos::authz::{catalog, policies};
use crate::db::repos::workspace::agent_configs;
use crate::db::DbPool;
use crate::engine::seed::seed_defaults;
use crate::error::AppError;

/// Bring a workspace's authorization catalog up to the defaults.
///
/// Roles get their default grant sets back, permission and menu labels are
/// refreshed, per-role menu visibility is reset to the defaults for the
/// seeded menus, and default ABAC policies are only inserted when missing.
/// Safe to call on every login.
pub fn ensure_workspace_seeds(pool: &DbPool, workspace_id: &str) -> Result<(), AppError> {
    let workspace_id = workspace_id.trim();
    if workspace_id.is_empty() {
        return Ok(());
    }

    let seed = seed_defaults(workspace_id);
    let now = now_rfc3339();
    {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        for role in &seed.roles {
            catalog::write_role(&tx, workspace_id, role, &now)?;
        }
        for permission in &seed.permissions {
            catalog::write_permission(&tx, workspace_id, permission, &now, false)?;
        }
        for menu in &seed.menus {
            catalog::write_menu(&tx, workspace_id, menu, &now, false)?;
        }
        for (role, items) in &seed.visibility {
            catalog::write_menu_visibility(&tx, workspace_id, *role, items, &now)?;
        }
        for policy in &seed.policies {
            policies::write_policy(&tx, policy, &now, false)?;
        }
        tx.commit()?;
    }

    agent_configs::ensure(pool, workspace_id)?;
    tracing::debug!(
        workspace_id,
        roles = seed.roles.len(),
        permissions = seed.permissions.len(),
        policies = seed.policies.len(),
        "Workspace seeds ensured"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::{AbacEffect, PermissionDefinition, Role};

    #[test]
    fn seeding_is_idempotent() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();

        assert_eq!(catalog::list_roles(&pool, "ws1").unwrap().len(), 4);
        assert_eq!(catalog::list_permissions(&pool, "ws1").unwrap().len(), 24);
        assert_eq!(catalog::list_menus(&pool, "ws1").unwrap().len(), 13);
        assert_eq!(policies::list(&pool, "ws1").unwrap().len(), 4);
        assert!(agent_configs::get(&pool, "ws1").unwrap().is_some());
    }

    #[test]
    fn reseeding_keeps_operator_policy_edits() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();

        let mut policy = policies::get_by_id(&pool, "abac_ws1_admin_manage").unwrap();
        policy.enabled = false;
        policies::upsert(&pool, "ws1", policy).unwrap();

        let mut permission = catalog::list_permissions(&pool, "ws1").unwrap()[0].clone();
        permission.enabled = false;
        let key = permission.key.clone();
        catalog::upsert_permission(&pool, "ws1", permission).unwrap();

        ensure_workspace_seeds(&pool, "ws1").unwrap();

        assert!(!policies::get_by_id(&pool, "abac_ws1_admin_manage").unwrap().enabled);
        let reseeded: Vec<PermissionDefinition> = catalog::list_permissions(&pool, "ws1").unwrap();
        assert!(!reseeded.iter().find(|p| p.key == key).unwrap().enabled);
    }

    #[test]
    fn reseeding_restores_role_grants() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();
        let mut viewer = catalog::list_roles(&pool, "ws1")
            .unwrap()
            .into_iter()
            .find(|r| r.key == Role::Viewer)
            .unwrap();
        viewer.permissions = vec!["admin.users.manage".into()];
        catalog::upsert_role(&pool, "ws1", viewer).unwrap();

        ensure_workspace_seeds(&pool, "ws1").unwrap();
        let viewer = catalog::list_roles(&pool, "ws1")
            .unwrap()
            .into_iter()
            .find(|r| r.key == Role::Viewer)
            .unwrap();
        assert_eq!(
            viewer.permissions,
            vec!["conversation.read", "project.read", "resource.read"]
        );
    }

    #[test]
    fn deny_policy_outranks_allows() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "ws1").unwrap();
        let listed = policies::list(&pool, "ws1").unwrap();
        let last = listed.last().unwrap();
        assert_eq!(last.effect, AbacEffect::Deny);
        assert!(listed[..listed.len() - 1]
            .iter()
            .all(|p| p.effect == AbacEffect::Allow && p.priority * 5 < last.priority));
    }

    #[test]
    fn blank_workspace_is_ignored() {
        let pool = init_test_db().unwrap();
        ensure_workspace_seeds(&pool, "  ").unwrap();
        assert!(catalog::list_roles(&pool, "").unwrap().is_empty());
    }
}
