//! Write-side normalization for workspace, project and agent-config records.

use crate::db::codec::{non_blank, now_rfc3339, sanitize_id_list, timestamp_or_now};
use crate::db::models::{
    AuthMode, Project, ProjectConfig, Workspace, WorkspaceAgentConfig, WorkspaceMode,
};

pub const DEFAULT_WORKSPACE_NAME: &str = "Workspace";
pub const DEFAULT_PROJECT_NAME: &str = "Project";
pub const DEFAULT_REPO_PATH: &str = ".";

pub const DEFAULT_MAX_MODEL_TURNS: i64 = 24;
pub const MIN_MAX_MODEL_TURNS: i64 = 4;
pub const MAX_MAX_MODEL_TURNS: i64 = 64;

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

/// Local workspaces always come out auth-disabled, login-disabled, default-local
/// and without a hub URL, whatever the input said.
pub fn workspace(input: Workspace, now: &str) -> Workspace {
    let mut item = input;
    item.id = item.id.trim().to_string();
    item.name = item.name.trim().to_string();
    if item.name.is_empty() {
        item.name = DEFAULT_WORKSPACE_NAME.to_string();
    }
    if item.created_at.trim().is_empty() {
        item.created_at = now.to_string();
    }
    if item.is_default_local {
        item.mode = WorkspaceMode::Local;
    }

    if item.mode == WorkspaceMode::Local {
        item.is_default_local = true;
        item.hub_url = None;
        item.login_disabled = true;
        item.auth_mode = Some(AuthMode::Disabled);
        return item;
    }

    item.auth_mode = Some(item.auth_mode.unwrap_or_else(|| AuthMode::default_for(item.mode)));
    item.hub_url = non_blank(item.hub_url.as_deref());
    item
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub fn project(input: Project) -> Project {
    let now = now_rfc3339();
    let mut item = input;
    item.id = item.id.trim().to_string();
    item.workspace_id = item.workspace_id.trim().to_string();
    item.name = item.name.trim().to_string();
    item.repo_path = item.repo_path.trim().to_string();
    item.default_model_id = non_blank(item.default_model_id.as_deref());
    if item.name.is_empty() {
        item.name = DEFAULT_PROJECT_NAME.to_string();
    }
    if item.repo_path.is_empty() {
        item.repo_path = DEFAULT_REPO_PATH.to_string();
    }
    item.current_revision = item.current_revision.max(0);
    if item.created_at.trim().is_empty() {
        item.created_at = now.clone();
    }
    if item.updated_at.trim().is_empty() {
        item.updated_at = now;
    }
    item
}

/// Id lists are sanitized and the default model, if any, is appended to
/// `model_ids` when missing.
pub fn project_config(input: ProjectConfig) -> ProjectConfig {
    let mut item = input;
    item.project_id = item.project_id.trim().to_string();
    item.model_ids = sanitize_id_list(&item.model_ids);
    item.rule_ids = sanitize_id_list(&item.rule_ids);
    item.skill_ids = sanitize_id_list(&item.skill_ids);
    item.mcp_ids = sanitize_id_list(&item.mcp_ids);
    item.default_model_id = non_blank(item.default_model_id.as_deref());
    if let Some(default_model_id) = &item.default_model_id {
        if !item.model_ids.contains(default_model_id) {
            item.model_ids.push(default_model_id.clone());
        }
    }
    item.updated_at = timestamp_or_now(&item.updated_at);
    item
}

/// The config a project has before anyone saves one: just its default model.
pub fn default_project_config(
    project_id: &str,
    default_model_id: Option<&str>,
    updated_at: &str,
) -> ProjectConfig {
    let default_model_id = non_blank(default_model_id);
    ProjectConfig {
        project_id: project_id.trim().to_string(),
        model_ids: default_model_id.iter().cloned().collect(),
        default_model_id,
        rule_ids: Vec::new(),
        skill_ids: Vec::new(),
        mcp_ids: Vec::new(),
        updated_at: timestamp_or_now(updated_at),
    }
}

// ---------------------------------------------------------------------------
// Workspace agent config
// ---------------------------------------------------------------------------

pub fn default_agent_config(workspace_id: &str, updated_at: &str) -> WorkspaceAgentConfig {
    let mut config = WorkspaceAgentConfig::default();
    config.execution.max_model_turns = DEFAULT_MAX_MODEL_TURNS;
    agent_config(workspace_id, config, updated_at)
}

pub fn agent_config(
    workspace_id: &str,
    input: WorkspaceAgentConfig,
    updated_at: &str,
) -> WorkspaceAgentConfig {
    let mut item = input;
    let workspace_id = workspace_id.trim();
    item.workspace_id = if workspace_id.is_empty() {
        item.workspace_id.trim().to_string()
    } else {
        workspace_id.to_string()
    };
    item.execution.max_model_turns = clamp_turns(item.execution.max_model_turns);
    item.updated_at = timestamp_or_now(updated_at);
    item
}

/// 0 means "default"; anything else is clamped into range.
pub fn clamp_turns(value: i64) -> i64 {
    let value = if value == 0 { DEFAULT_MAX_MODEL_TURNS } else { value };
    value.clamp(MIN_MAX_MODEL_TURNS, MAX_MAX_MODEL_TURNS)
}
