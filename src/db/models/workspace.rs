use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::text_enum;

// ============================================================================
// Workspaces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum WorkspaceMode {
    #[default]
    Local,
    Remote,
}

text_enum!(WorkspaceMode {
    Local => "local",
    Remote => "remote",
});

impl WorkspaceMode {
    /// Stored modes other than `remote` read as local; a default-local row is always local.
    pub fn from_stored(raw: &str, local_hint: bool) -> Self {
        if local_hint {
            return Self::Local;
        }
        Self::parse(raw).unwrap_or(Self::Local)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AuthMode {
    Disabled,
    PasswordOrToken,
    TokenOnly,
}

text_enum!(AuthMode {
    Disabled => "disabled",
    PasswordOrToken => "password_or_token",
    TokenOnly => "token_only",
});

impl AuthMode {
    pub fn default_for(mode: WorkspaceMode) -> Self {
        match mode {
            WorkspaceMode::Local => Self::Disabled,
            WorkspaceMode::Remote => Self::PasswordOrToken,
        }
    }

    pub fn from_stored(raw: &str, mode: WorkspaceMode) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self::default_for(mode))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: WorkspaceMode,
    pub hub_url: Option<String>,
    #[serde(default)]
    pub is_default_local: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub login_disabled: bool,
    /// Absent on input means "derive from mode".
    pub auth_mode: Option<AuthMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkspaceConnection {
    pub workspace_id: String,
    pub hub_url: String,
    pub username: String,
    #[serde(default)]
    pub connection_status: String,
    #[serde(default)]
    pub connected_at: String,
}

// ============================================================================
// Workspace agent configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TraceDetailLevel {
    Basic,
    #[default]
    Verbose,
}

text_enum!(TraceDetailLevel {
    Basic => "basic",
    Verbose => "verbose",
});

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgentExecutionConfig {
    /// 0 means "use the default".
    #[serde(default)]
    #[ts(type = "number")]
    pub max_model_turns: i64,
}

fn default_show_process_trace() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgentDisplayConfig {
    #[serde(default = "default_show_process_trace")]
    pub show_process_trace: bool,
    #[serde(default)]
    pub trace_detail_level: TraceDetailLevel,
}

impl Default for AgentDisplayConfig {
    fn default() -> Self {
        Self {
            show_process_trace: true,
            trace_detail_level: TraceDetailLevel::Verbose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkspaceAgentConfig {
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub execution: AgentExecutionConfig,
    #[serde(default)]
    pub display: AgentDisplayConfig,
    #[serde(default)]
    pub updated_at: String,
}
