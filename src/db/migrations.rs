use rusqlite::Connection;

use crate::error::AppError;

/// Apply the schema. Every statement is idempotent, so this runs on every open.
pub fn run(conn: &Connection) -> Result<(), AppError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Workspaces
-- ============================================================================

CREATE TABLE IF NOT EXISTS workspaces (
    id                TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    mode              TEXT NOT NULL,
    hub_url           TEXT,
    is_default_local  INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    login_disabled    INTEGER NOT NULL DEFAULT 0,
    auth_mode         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workspace_connections (
    workspace_id       TEXT PRIMARY KEY,
    hub_url            TEXT NOT NULL,
    username           TEXT NOT NULL,
    connection_status  TEXT NOT NULL,
    connected_at       TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workspace_agent_configs (
    workspace_id  TEXT PRIMARY KEY,
    config_json   TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- ============================================================================
-- Users & Sessions
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY,
    workspace_id   TEXT NOT NULL,
    username       TEXT NOT NULL,
    password_hash  TEXT NOT NULL,
    display_name   TEXT NOT NULL,
    role           TEXT NOT NULL,
    enabled        INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE(workspace_id, username)
);

CREATE TABLE IF NOT EXISTS sessions (
    access_token        TEXT PRIMARY KEY,
    refresh_token       TEXT NOT NULL UNIQUE,
    workspace_id        TEXT NOT NULL,
    user_id             TEXT NOT NULL,
    display_name        TEXT NOT NULL,
    role                TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    refresh_expires_at  TEXT NOT NULL,
    revoked             INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

-- ============================================================================
-- Authorization catalogs
-- ============================================================================

CREATE TABLE IF NOT EXISTS roles (
    workspace_id  TEXT NOT NULL,
    role_key      TEXT NOT NULL,
    name          TEXT NOT NULL,
    enabled       INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (workspace_id, role_key)
);

CREATE TABLE IF NOT EXISTS role_grants (
    workspace_id    TEXT NOT NULL,
    role_key        TEXT NOT NULL,
    permission_key  TEXT NOT NULL,
    PRIMARY KEY (workspace_id, role_key, permission_key)
);

CREATE TABLE IF NOT EXISTS permissions (
    workspace_id    TEXT NOT NULL,
    permission_key  TEXT NOT NULL,
    label           TEXT NOT NULL,
    enabled         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (workspace_id, permission_key)
);

CREATE TABLE IF NOT EXISTS menus (
    workspace_id  TEXT NOT NULL,
    menu_key      TEXT NOT NULL,
    label         TEXT NOT NULL,
    enabled       INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (workspace_id, menu_key)
);

CREATE TABLE IF NOT EXISTS permission_visibility (
    workspace_id  TEXT NOT NULL,
    role_key      TEXT NOT NULL,
    menu_key      TEXT NOT NULL,
    visibility    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (workspace_id, role_key, menu_key)
);

CREATE TABLE IF NOT EXISTS abac_policies (
    id             TEXT PRIMARY KEY,
    workspace_id   TEXT NOT NULL,
    name           TEXT NOT NULL,
    effect         TEXT NOT NULL,
    priority       INTEGER NOT NULL DEFAULT 100,
    enabled        INTEGER NOT NULL DEFAULT 1,
    subject_expr   TEXT NOT NULL,
    resource_expr  TEXT NOT NULL,
    action_expr    TEXT NOT NULL,
    context_expr   TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_abac_policies_workspace ON abac_policies(workspace_id, priority);

CREATE TABLE IF NOT EXISTS audit_logs (
    id             TEXT PRIMARY KEY,
    workspace_id   TEXT NOT NULL,
    actor_user_id  TEXT,
    action_key     TEXT NOT NULL,
    target_type    TEXT NOT NULL,
    target_id      TEXT NOT NULL,
    result         TEXT NOT NULL,
    details_json   TEXT NOT NULL,
    trace_id       TEXT NOT NULL,
    created_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_workspace_created ON audit_logs(workspace_id, created_at DESC);

-- ============================================================================
-- Projects
-- ============================================================================

CREATE TABLE IF NOT EXISTS projects (
    id                       TEXT PRIMARY KEY,
    workspace_id             TEXT NOT NULL,
    name                     TEXT NOT NULL,
    repo_path                TEXT NOT NULL,
    is_git                   INTEGER NOT NULL DEFAULT 1,
    default_model_config_id  TEXT,
    default_mode             TEXT NOT NULL,
    current_revision         INTEGER NOT NULL DEFAULT 0,
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_projects_workspace_created ON projects(workspace_id, created_at);

CREATE TABLE IF NOT EXISTS project_configs (
    project_id               TEXT PRIMARY KEY,
    workspace_id             TEXT NOT NULL,
    model_config_ids_json    TEXT NOT NULL,
    default_model_config_id  TEXT,
    rule_ids_json            TEXT NOT NULL,
    skill_ids_json           TEXT NOT NULL,
    mcp_ids_json             TEXT NOT NULL,
    updated_at               TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_project_configs_workspace_updated ON project_configs(workspace_id, updated_at DESC);

-- ============================================================================
-- Conversation / execution graph
-- ============================================================================

CREATE TABLE IF NOT EXISTS conversations (
    id                   TEXT PRIMARY KEY,
    workspace_id         TEXT NOT NULL,
    project_id           TEXT NOT NULL,
    name                 TEXT NOT NULL,
    queue_state          TEXT NOT NULL,
    default_mode         TEXT NOT NULL,
    model_id             TEXT NOT NULL,
    rule_ids_json        TEXT NOT NULL DEFAULT '[]',
    skill_ids_json       TEXT NOT NULL DEFAULT '[]',
    mcp_ids_json         TEXT NOT NULL DEFAULT '[]',
    base_revision        INTEGER NOT NULL DEFAULT 0,
    active_execution_id  TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_project_created ON conversations(project_id, created_at);

CREATE TABLE IF NOT EXISTS conversation_messages (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL,
    role             TEXT NOT NULL,
    content          TEXT NOT NULL,
    queue_index      INTEGER,
    can_rollback     INTEGER,
    created_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversation_messages_conversation_created ON conversation_messages(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS conversation_snapshots (
    id                         TEXT PRIMARY KEY,
    conversation_id            TEXT NOT NULL,
    rollback_point_message_id  TEXT NOT NULL,
    queue_state                TEXT NOT NULL,
    worktree_ref               TEXT,
    inspector_state_json       TEXT NOT NULL,
    messages_json              TEXT NOT NULL,
    execution_ids_json         TEXT NOT NULL,
    created_at                 TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversation_snapshots_conversation_created ON conversation_snapshots(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS executions (
    id                              TEXT PRIMARY KEY,
    workspace_id                    TEXT NOT NULL,
    conversation_id                 TEXT NOT NULL,
    message_id                      TEXT NOT NULL,
    state                           TEXT NOT NULL,
    mode                            TEXT NOT NULL,
    model_id                        TEXT NOT NULL,
    mode_snapshot                   TEXT NOT NULL,
    model_snapshot_json             TEXT NOT NULL,
    resource_profile_snapshot_json  TEXT,
    agent_config_snapshot_json      TEXT,
    tokens_in                       INTEGER NOT NULL DEFAULT 0,
    tokens_out                      INTEGER NOT NULL DEFAULT 0,
    project_revision_snapshot       INTEGER NOT NULL DEFAULT 0,
    queue_index                     INTEGER NOT NULL,
    trace_id                        TEXT NOT NULL,
    created_at                      TEXT NOT NULL,
    updated_at                      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_executions_conversation_created ON executions(conversation_id, created_at);

CREATE TABLE IF NOT EXISTS execution_events (
    event_id         TEXT PRIMARY KEY,
    execution_id     TEXT NOT NULL,
    conversation_id  TEXT NOT NULL,
    trace_id         TEXT NOT NULL,
    sequence         INTEGER NOT NULL,
    queue_index      INTEGER NOT NULL,
    type             TEXT NOT NULL,
    timestamp        TEXT NOT NULL,
    payload_json     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_execution_events_conversation_sequence ON execution_events(conversation_id, sequence);

-- ============================================================================
-- Workers & Leases
-- ============================================================================

CREATE TABLE IF NOT EXISTS workers (
    worker_id          TEXT PRIMARY KEY,
    capabilities_json  TEXT NOT NULL,
    status             TEXT NOT NULL,
    last_heartbeat     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS execution_leases (
    execution_id      TEXT PRIMARY KEY,
    worker_id         TEXT NOT NULL,
    lease_version     INTEGER NOT NULL,
    lease_expires_at  TEXT NOT NULL,
    run_attempt       INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_execution_leases_worker ON execution_leases(worker_id);

"#;
