use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConversationMode {
    #[default]
    Agent,
    Plan,
}

text_enum!(ConversationMode {
    Agent => "agent",
    Plan => "plan",
});

impl ConversationMode {
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repo_path: String,
    #[serde(default)]
    pub is_git: bool,
    pub default_model_id: Option<String>,
    #[serde(default)]
    pub default_mode: ConversationMode,
    #[serde(default)]
    #[ts(type = "number")]
    pub current_revision: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

// ============================================================================
// Project resource bindings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProjectConfig {
    pub project_id: String,
    #[serde(default)]
    pub model_ids: Vec<String>,
    /// When set, always a member of `model_ids`.
    pub default_model_id: Option<String>,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub skill_ids: Vec<String>,
    #[serde(default)]
    pub mcp_ids: Vec<String>,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkspaceProjectConfigItem {
    pub project_id: String,
    pub project_name: String,
    pub config: ProjectConfig,
}
