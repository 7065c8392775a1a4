//! Default authorization catalog every workspace starts from.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::db::models::{
    AbacEffect, AbacPolicy, MatcherExpr, MenuDefinition, PermissionDefinition, Predicate, Role,
    RoleDefinition, Visibility,
};

/// Grant key that stands for every permission.
pub const WILDCARD_PERMISSION: &str = "*";

const ADMIN_GRANTS: &[&str] = &[WILDCARD_PERMISSION];

const VIEWER_GRANTS: &[&str] = &["project.read", "conversation.read", "resource.read"];

const DEVELOPER_GRANTS: &[&str] = &[
    "project.read",
    "project.write",
    "project_config.read",
    "conversation.read",
    "conversation.write",
    "execution.control",
    "resource.read",
    "resource.write",
    "resource_config.read",
    "resource_config.write",
    "model.test",
    "mcp.connect",
    "share.request",
    "share.revoke",
    "catalog.update_root",
];

const APPROVER_GRANTS: &[&str] = &[
    "project.read",
    "project.write",
    "project_config.read",
    "conversation.read",
    "conversation.write",
    "execution.control",
    "resource.read",
    "resource.write",
    "resource_config.read",
    "resource_config.write",
    "resource_config.delete",
    "model.test",
    "mcp.connect",
    "share.request",
    "share.approve",
    "share.reject",
    "share.revoke",
    "catalog.update_root",
    "admin.audit.read",
];

const PERMISSIONS: &[(&str, &str)] = &[
    ("project.read", "Read projects"),
    ("project.write", "Write projects"),
    ("conversation.read", "Read conversations"),
    ("conversation.write", "Write conversations"),
    ("execution.control", "Control executions"),
    ("resource.read", "Read resources"),
    ("resource.write", "Write resources"),
    ("resource_config.read", "Read resource configs"),
    ("resource_config.write", "Write resource configs"),
    ("resource_config.delete", "Delete resource configs"),
    ("project_config.read", "Read project configs"),
    ("model.test", "Test model configs"),
    ("mcp.connect", "Connect MCP servers"),
    ("catalog.update_root", "Update model catalog root"),
    ("share.request", "Request shares"),
    ("share.approve", "Approve shares"),
    ("share.reject", "Reject shares"),
    ("share.revoke", "Revoke shares"),
    ("admin.users.manage", "Manage members"),
    ("admin.roles.manage", "Manage roles"),
    ("admin.permissions.manage", "Manage permissions"),
    ("admin.menus.manage", "Manage menus"),
    ("admin.policies.manage", "Manage policies"),
    ("admin.audit.read", "Read audit log"),
];

const MENUS: &[(&str, &str)] = &[
    ("main", "Main"),
    ("remote_account", "Account"),
    ("remote_members_roles", "Members & roles"),
    ("remote_permissions_audit", "Permissions & audit"),
    ("workspace_project_config", "Project config"),
    ("workspace_agent", "Agent config"),
    ("workspace_model", "Model config"),
    ("workspace_rules", "Rules"),
    ("workspace_skills", "Skills"),
    ("workspace_mcp", "MCP servers"),
    ("settings_theme", "Theme"),
    ("settings_i18n", "Language"),
    ("settings_general", "General"),
];

/// Menus developers and approvers may edit but viewers only read.
const WORKSPACE_CONFIG_MENUS: &[&str] = &[
    "workspace_project_config",
    "workspace_agent",
    "workspace_model",
    "workspace_rules",
    "workspace_skills",
    "workspace_mcp",
];

const SELF_WORKSPACE_ACTIONS: &[&str] = &[
    "project.read",
    "project.write",
    "conversation.read",
    "conversation.write",
    "execution.control",
    "resource.read",
    "resource.write",
    "resource_config.read",
    "resource_config.write",
    "resource_config.delete",
    "project_config.read",
    "model.test",
    "mcp.connect",
    "catalog.update_root",
    "share.request",
    "share.revoke",
    "admin.audit.read",
];

const ADMIN_MANAGE_ACTIONS: &[&str] = &[
    "admin.users.manage",
    "admin.roles.manage",
    "admin.permissions.manage",
    "admin.menus.manage",
    "admin.policies.manage",
];

/// Everything `ensure_workspace_seeds` writes for one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceSeed {
    pub roles: Vec<RoleDefinition>,
    pub permissions: Vec<PermissionDefinition>,
    pub menus: Vec<MenuDefinition>,
    pub visibility: Vec<(Role, BTreeMap<String, Visibility>)>,
    pub policies: Vec<AbacPolicy>,
}

pub fn seed_defaults(workspace_id: &str) -> WorkspaceSeed {
    WorkspaceSeed {
        roles: Role::ALL.iter().map(|role| default_role(*role)).collect(),
        permissions: PERMISSIONS
            .iter()
            .map(|(key, label)| PermissionDefinition {
                key: key.to_string(),
                label: label.to_string(),
                enabled: true,
            })
            .collect(),
        menus: MENUS
            .iter()
            .map(|(key, label)| MenuDefinition {
                key: key.to_string(),
                label: label.to_string(),
                enabled: true,
            })
            .collect(),
        visibility: Role::ALL
            .iter()
            .map(|role| (*role, default_menu_visibility(*role)))
            .collect(),
        policies: default_policies(workspace_id),
    }
}

pub fn default_role(role: Role) -> RoleDefinition {
    let (name, grants): (&str, &[&str]) = match role {
        Role::Viewer => ("Viewer", VIEWER_GRANTS),
        Role::Developer => ("Developer", DEVELOPER_GRANTS),
        Role::Approver => ("Approver", APPROVER_GRANTS),
        Role::Admin => ("Admin", ADMIN_GRANTS),
    };
    RoleDefinition {
        key: role,
        name: name.to_string(),
        permissions: grants.iter().map(|g| g.to_string()).collect(),
        enabled: true,
    }
}

pub fn default_menu_visibility(role: Role) -> BTreeMap<String, Visibility> {
    let mut items: BTreeMap<String, Visibility> = MENUS
        .iter()
        .map(|(key, _)| (key.to_string(), Visibility::Enabled))
        .collect();
    if role == Role::Admin {
        return items;
    }

    items.insert("remote_members_roles".into(), Visibility::Hidden);
    let audit = if role == Role::Approver {
        Visibility::Enabled
    } else {
        Visibility::Hidden
    };
    items.insert("remote_permissions_audit".into(), audit);

    if role == Role::Viewer {
        for key in WORKSPACE_CONFIG_MENUS {
            items.insert(key.to_string(), Visibility::Readonly);
        }
    }
    items
}

fn same_workspace() -> MatcherExpr {
    MatcherExpr::new().with("workspace_id", Predicate::Eq(json!("$subject.workspace_id")))
}

fn high_risk() -> MatcherExpr {
    MatcherExpr::new().with(
        "risk_level",
        Predicate::In(vec![json!("high"), json!("critical")]),
    )
}

fn actions(names: &[&str]) -> MatcherExpr {
    MatcherExpr::new().with(
        "name",
        Predicate::In(names.iter().map(|n| json!(n)).collect()),
    )
}

fn role_values(roles: &[Role]) -> Vec<Value> {
    roles.iter().map(|r| json!(r.as_str())).collect()
}

pub fn default_policies(workspace_id: &str) -> Vec<AbacPolicy> {
    let policy = |slug: &str,
                  name: &str,
                  effect: AbacEffect,
                  priority: i64,
                  subject: MatcherExpr,
                  action: MatcherExpr,
                  context: MatcherExpr| AbacPolicy {
        id: format!("abac_{workspace_id}_{slug}"),
        workspace_id: workspace_id.to_string(),
        name: name.to_string(),
        effect,
        priority,
        enabled: true,
        subject_expr: subject,
        resource_expr: same_workspace(),
        action_expr: action,
        context_expr: context,
        created_at: String::new(),
        updated_at: String::new(),
    };

    vec![
        policy(
            "allow_self_workspace",
            "allow self workspace",
            AbacEffect::Allow,
            100,
            MatcherExpr::new().with(
                "roles",
                Predicate::In(role_values(&[Role::Developer, Role::Approver, Role::Admin])),
            ),
            actions(SELF_WORKSPACE_ACTIONS),
            MatcherExpr::new(),
        ),
        policy(
            "share_approval",
            "allow share approve/reject",
            AbacEffect::Allow,
            110,
            MatcherExpr::new().with(
                "roles",
                Predicate::In(role_values(&[Role::Approver, Role::Admin])),
            ),
            actions(&["share.approve", "share.reject"]),
            high_risk(),
        ),
        policy(
            "admin_manage",
            "allow admin manage",
            AbacEffect::Allow,
            120,
            MatcherExpr::new().with("roles", Predicate::Contains(json!(Role::Admin.as_str()))),
            actions(ADMIN_MANAGE_ACTIONS),
            MatcherExpr::new(),
        ),
        policy(
            "deny_non_admin_high_risk_admin_manage",
            "deny non-admin high risk admin manage",
            AbacEffect::Deny,
            1000,
            MatcherExpr::new().with("roles", Predicate::Neq(json!(Role::Admin.as_str()))),
            actions(ADMIN_MANAGE_ACTIONS),
            high_risk(),
        ),
    ]
}
