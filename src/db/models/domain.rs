use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use super::{ConversationMode, TraceDetailLevel, WorkspaceAgentConfig};
use crate::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QueueState {
    #[default]
    Idle,
    Running,
    Queued,
}

text_enum!(QueueState {
    Idle => "idle",
    Running => "running",
    Queued => "queued",
});

impl QueueState {
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

text_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

impl MessageRole {
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::User)
    }
}

/// Execution states the hub itself writes. Stored rows may carry others
/// (older builds), so `Execution::state` stays a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ExecutionState {
    Queued,
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(ExecutionState {
    Queued => "queued",
    Pending => "pending",
    Executing => "executing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Conversation {
    pub id: String,
    pub workspace_id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub queue_state: QueueState,
    #[serde(default)]
    pub default_mode: ConversationMode,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub skill_ids: Vec<String>,
    #[serde(default)]
    pub mcp_ids: Vec<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub base_revision: i64,
    pub active_execution_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub queue_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_rollback: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversationInspector {
    #[serde(default)]
    pub tab: String,
}

/// Rollback checkpoint for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversationSnapshot {
    pub id: String,
    pub conversation_id: String,
    pub rollback_point_message_id: String,
    #[serde(default)]
    pub queue_state: QueueState,
    pub worktree_ref: Option<String>,
    #[serde(default)]
    pub inspector_state: ConversationInspector,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub execution_ids: Vec<String>,
    pub created_at: String,
}

// ============================================================================
// Executions
// ============================================================================

/// Model settings frozen when the execution starts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModelSnapshot {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub timeout_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[ts(type = "Record<string, unknown>")]
    pub params: Map<String, Value>,
}

/// Resource bindings frozen when the execution starts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecutionResourceProfile {
    #[serde(default)]
    pub model_config_id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub skill_ids: Vec<String>,
    #[serde(default)]
    pub mcp_ids: Vec<String>,
    #[serde(default)]
    pub project_file_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecutionAgentConfigSnapshot {
    #[ts(type = "number")]
    pub max_model_turns: i64,
    pub show_process_trace: bool,
    pub trace_detail_level: TraceDetailLevel,
}

impl From<&WorkspaceAgentConfig> for ExecutionAgentConfigSnapshot {
    fn from(config: &WorkspaceAgentConfig) -> Self {
        let normalized = crate::engine::normalize::agent_config(
            &config.workspace_id,
            config.clone(),
            &config.updated_at,
        );
        Self {
            max_model_turns: normalized.execution.max_model_turns,
            show_process_trace: normalized.display.show_process_trace,
            trace_detail_level: normalized.display.trace_detail_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Execution {
    pub id: String,
    pub workspace_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub state: String,
    #[serde(default)]
    pub mode: ConversationMode,
    pub model_id: String,
    #[serde(default)]
    pub mode_snapshot: ConversationMode,
    #[serde(default)]
    pub model_snapshot: ModelSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_profile_snapshot: Option<ExecutionResourceProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config_snapshot: Option<ExecutionAgentConfigSnapshot>,
    #[serde(default)]
    #[ts(type = "number")]
    pub tokens_in: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub tokens_out: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub project_revision_snapshot: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub queue_index: i64,
    #[serde(default)]
    pub trace_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Execution {
    /// `None` for states this build does not know about.
    pub fn known_state(&self) -> Option<ExecutionState> {
        ExecutionState::parse(&self.state)
    }
}

/// Append-only, ordered by (conversation_id, sequence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecutionEvent {
    pub event_id: String,
    pub execution_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[ts(type = "number")]
    pub sequence: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub queue_index: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub payload: Map<String, Value>,
}

/// The whole conversation/execution/event graph, as loaded or to be swapped in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecutionDomainSnapshot {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub conversation_messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub conversation_snapshots: Vec<ConversationSnapshot>,
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub execution_events: Vec<ExecutionEvent>,
}

impl ExecutionDomainSnapshot {
    pub fn row_count(&self) -> usize {
        self.conversations.len()
            + self.conversation_messages.len()
            + self.conversation_snapshots.len()
            + self.executions.len()
            + self.execution_events.len()
    }
}
