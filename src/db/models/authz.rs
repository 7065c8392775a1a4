use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use super::Role;
use crate::text_enum;

// ============================================================================
// Visibility
// ============================================================================

/// Menus use enabled/readonly/hidden; actions use enabled/readonly/disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Visibility {
    Enabled,
    Readonly,
    Disabled,
    Hidden,
}

text_enum!(Visibility {
    Enabled => "enabled",
    Readonly => "readonly",
    Disabled => "disabled",
    Hidden => "hidden",
});

impl Visibility {
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Hidden)
    }
}

// ============================================================================
// Catalogs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoleDefinition {
    pub key: Role,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PermissionDefinition {
    pub key: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MenuDefinition {
    pub key: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoleMenuVisibility {
    pub role_key: Role,
    pub items: BTreeMap<String, Visibility>,
}

// ============================================================================
// ABAC policies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AbacEffect {
    #[default]
    Allow,
    Deny,
}

text_enum!(AbacEffect {
    Allow => "allow",
    Deny => "deny",
});

impl AbacEffect {
    /// Anything but `deny` is an allow.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Allow)
    }
}

/// One attribute test. Stored as `{"<op>": <operand>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    In(Vec<Value>),
    Eq(Value),
    Neq(Value),
    Contains(Value),
}

/// Attribute name to predicate. Uninterpreted here; an evaluator elsewhere
/// resolves `$subject.*` references and applies the operators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatcherExpr(pub BTreeMap<String, Predicate>);

impl MatcherExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: &str, predicate: Predicate) -> Self {
        self.0.insert(attribute.to_string(), predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, attribute: &str) -> Option<&Predicate> {
        self.0.get(attribute)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AbacPolicy {
    #[serde(default)]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub effect: AbacEffect,
    /// Lower runs first. 0 on input means the default of 100.
    #[serde(default)]
    #[ts(type = "number")]
    pub priority: i64,
    pub enabled: bool,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub subject_expr: MatcherExpr,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub resource_expr: MatcherExpr,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub action_expr: MatcherExpr,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub context_expr: MatcherExpr,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

// ============================================================================
// Permission snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PermissionSnapshot {
    pub role: Role,
    pub permissions: Vec<String>,
    pub menu_visibility: BTreeMap<String, Visibility>,
    pub action_visibility: BTreeMap<String, Visibility>,
    pub policy_version: String,
    pub generated_at: String,
}

// ============================================================================
// Audit log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    pub workspace_id: String,
    pub actor_user_id: Option<String>,
    pub action_key: String,
    pub target_type: String,
    pub target_id: String,
    pub result: String,
    pub details: Value,
    pub trace_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAuditEntry {
    pub workspace_id: String,
    pub actor_user_id: Option<String>,
    pub action_key: String,
    pub target_type: String,
    pub target_id: String,
    pub result: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub trace_id: String,
}
