use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::text_enum;

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Viewer,
    Developer,
    Approver,
    Admin,
}

text_enum!(Role {
    Viewer => "viewer",
    Developer => "developer",
    Approver => "approver",
    Admin => "admin",
});

impl Role {
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Developer, Role::Approver, Role::Admin];

    /// Unknown or blank role keys collapse to developer.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Developer)
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub workspace_id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateUserInput {
    pub workspace_id: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateUserInput {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub enabled: Option<bool>,
    pub password: Option<String>,
}

// ============================================================================
// Sessions
// ============================================================================

/// A paired access/refresh token grant. Timestamps are RFC 3339 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub workspace_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub expires_at: String,
    pub refresh_expires_at: String,
    pub revoked: bool,
    pub created_at: String,
    pub updated_at: String,
}
