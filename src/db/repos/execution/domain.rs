//! Whole-graph persistence for conversations, messages, rollback snapshots,
//! executions and execution events.

use rusqlite::{params, Connection, Row, Transaction};

use crate::db::codec::{
    bool_to_int, encode_id_list, encode_json, id_list_column, json_column, non_blank,
    optional_bool_column, optional_json_column, optional_text_column,
};
use crate::db::models::{
    Conversation, ConversationMessage, ConversationMode, ConversationSnapshot, Execution,
    ExecutionDomainSnapshot, ExecutionEvent, MessageRole, QueueState,
};
use crate::db::DbPool;
use crate::error::AppError;

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_conversation(row: &Row) -> rusqlite::Result<Conversation> {
    let queue_state: String = row.get("queue_state")?;
    let default_mode: String = row.get("default_mode")?;
    Ok(Conversation {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        queue_state: QueueState::from_stored(&queue_state),
        default_mode: ConversationMode::from_stored(&default_mode),
        model_id: row.get("model_id")?,
        rule_ids: id_list_column(row, "rule_ids_json")?,
        skill_ids: id_list_column(row, "skill_ids_json")?,
        mcp_ids: id_list_column(row, "mcp_ids_json")?,
        base_revision: row.get("base_revision")?,
        active_execution_id: optional_text_column(row, "active_execution_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<ConversationMessage> {
    let role: String = row.get("role")?;
    Ok(ConversationMessage {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        role: MessageRole::from_stored(&role),
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        queue_index: row.get("queue_index")?,
        can_rollback: optional_bool_column(row, "can_rollback")?,
    })
}

fn row_to_snapshot(row: &Row) -> rusqlite::Result<ConversationSnapshot> {
    let queue_state: String = row.get("queue_state")?;
    Ok(ConversationSnapshot {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        rollback_point_message_id: row.get("rollback_point_message_id")?,
        queue_state: QueueState::from_stored(&queue_state),
        worktree_ref: optional_text_column(row, "worktree_ref")?,
        inspector_state: json_column(row, "inspector_state_json")?,
        messages: json_column(row, "messages_json")?,
        execution_ids: id_list_column(row, "execution_ids_json")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_execution(row: &Row) -> rusqlite::Result<Execution> {
    let mode: String = row.get("mode")?;
    let mode_snapshot: String = row.get("mode_snapshot")?;
    Ok(Execution {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        conversation_id: row.get("conversation_id")?,
        message_id: row.get("message_id")?,
        state: row.get("state")?,
        mode: ConversationMode::from_stored(&mode),
        model_id: row.get("model_id")?,
        mode_snapshot: ConversationMode::from_stored(&mode_snapshot),
        model_snapshot: json_column(row, "model_snapshot_json")?,
        resource_profile_snapshot: optional_json_column(row, "resource_profile_snapshot_json")?,
        agent_config_snapshot: optional_json_column(row, "agent_config_snapshot_json")?,
        tokens_in: row.get("tokens_in")?,
        tokens_out: row.get("tokens_out")?,
        project_revision_snapshot: row.get("project_revision_snapshot")?,
        queue_index: row.get("queue_index")?,
        trace_id: row.get("trace_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<ExecutionEvent> {
    Ok(ExecutionEvent {
        event_id: row.get("event_id")?,
        execution_id: row.get("execution_id")?,
        conversation_id: row.get("conversation_id")?,
        trace_id: row.get("trace_id")?,
        sequence: row.get("sequence")?,
        queue_index: row.get("queue_index")?,
        event_type: row.get("type")?,
        timestamp: row.get("timestamp")?,
        payload: json_column(row, "payload_json")?,
    })
}

fn query_all<T, F>(conn: &Connection, sql: &str, mapper: F) -> Result<Vec<T>, AppError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], mapper)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

// ============================================================================
// Load
// ============================================================================

/// Read the whole graph inside one read transaction.
pub fn load_snapshot(pool: &DbPool) -> Result<ExecutionDomainSnapshot, AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let snapshot = ExecutionDomainSnapshot {
        conversations: query_all(
            &tx,
            "SELECT * FROM conversations ORDER BY created_at ASC, id ASC",
            row_to_conversation,
        )?,
        conversation_messages: query_all(
            &tx,
            "SELECT * FROM conversation_messages ORDER BY created_at ASC, id ASC",
            row_to_message,
        )?,
        conversation_snapshots: query_all(
            &tx,
            "SELECT * FROM conversation_snapshots ORDER BY created_at ASC, id ASC",
            row_to_snapshot,
        )?,
        executions: query_all(
            &tx,
            "SELECT * FROM executions ORDER BY created_at ASC, id ASC",
            row_to_execution,
        )?,
        execution_events: query_all(
            &tx,
            "SELECT * FROM execution_events
             ORDER BY conversation_id ASC, sequence ASC, event_id ASC",
            row_to_event,
        )?,
    };
    tx.commit()?;

    tracing::debug!(rows = snapshot.row_count(), "Loaded execution domain snapshot");
    Ok(snapshot)
}

// ============================================================================
// Replace
// ============================================================================

fn insert_conversation(tx: &Transaction, item: &Conversation) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO conversations
         (id, workspace_id, project_id, name, queue_state, default_mode, model_id,
          rule_ids_json, skill_ids_json, mcp_ids_json, base_revision, active_execution_id,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            item.id,
            item.workspace_id,
            item.project_id,
            item.name,
            item.queue_state.as_str(),
            item.default_mode.as_str(),
            item.model_id,
            encode_id_list(&item.rule_ids)?,
            encode_id_list(&item.skill_ids)?,
            encode_id_list(&item.mcp_ids)?,
            item.base_revision,
            non_blank(item.active_execution_id.as_deref()),
            item.created_at,
            item.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_message(tx: &Transaction, item: &ConversationMessage) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO conversation_messages
         (id, conversation_id, role, content, queue_index, can_rollback, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.id,
            item.conversation_id,
            item.role.as_str(),
            item.content,
            item.queue_index,
            item.can_rollback.map(bool_to_int),
            item.created_at,
        ],
    )?;
    Ok(())
}

fn insert_snapshot(tx: &Transaction, item: &ConversationSnapshot) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO conversation_snapshots
         (id, conversation_id, rollback_point_message_id, queue_state, worktree_ref,
          inspector_state_json, messages_json, execution_ids_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            item.id,
            item.conversation_id,
            item.rollback_point_message_id,
            item.queue_state.as_str(),
            non_blank(item.worktree_ref.as_deref()),
            encode_json(&item.inspector_state)?,
            encode_json(&item.messages)?,
            encode_id_list(&item.execution_ids)?,
            item.created_at,
        ],
    )?;
    Ok(())
}

fn insert_execution(tx: &Transaction, item: &Execution) -> Result<(), AppError> {
    let resource_profile = item
        .resource_profile_snapshot
        .as_ref()
        .map(encode_json)
        .transpose()?;
    let agent_config = item
        .agent_config_snapshot
        .as_ref()
        .map(encode_json)
        .transpose()?;
    tx.execute(
        "INSERT INTO executions
         (id, workspace_id, conversation_id, message_id, state, mode, model_id, mode_snapshot,
          model_snapshot_json, resource_profile_snapshot_json, agent_config_snapshot_json,
          tokens_in, tokens_out, project_revision_snapshot, queue_index, trace_id,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            item.id,
            item.workspace_id,
            item.conversation_id,
            item.message_id,
            item.state,
            item.mode.as_str(),
            item.model_id,
            item.mode_snapshot.as_str(),
            encode_json(&item.model_snapshot)?,
            resource_profile,
            agent_config,
            item.tokens_in,
            item.tokens_out,
            item.project_revision_snapshot,
            item.queue_index,
            item.trace_id,
            item.created_at,
            item.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_event(tx: &Transaction, item: &ExecutionEvent) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO execution_events
         (event_id, execution_id, conversation_id, trace_id, sequence, queue_index, type,
          timestamp, payload_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            item.event_id,
            item.execution_id,
            item.conversation_id,
            item.trace_id,
            item.sequence,
            item.queue_index,
            item.event_type,
            item.timestamp,
            encode_json(&item.payload)?,
        ],
    )?;
    Ok(())
}

/// Swap the whole graph for `snapshot`, all or nothing.
///
/// Rows are cleared children-first and reinserted parents-first. Any failed
/// insert drops the transaction uncommitted, which rolls every table back to
/// its prior contents. Worker and lease rows are left alone.
pub fn replace_snapshot(pool: &DbPool, snapshot: &ExecutionDomainSnapshot) -> Result<(), AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    for table in [
        "execution_events",
        "executions",
        "conversation_snapshots",
        "conversation_messages",
        "conversations",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }

    for item in &snapshot.conversations {
        insert_conversation(&tx, item)?;
    }
    for item in &snapshot.conversation_messages {
        insert_message(&tx, item)?;
    }
    for item in &snapshot.conversation_snapshots {
        insert_snapshot(&tx, item)?;
    }
    for item in &snapshot.executions {
        insert_execution(&tx, item)?;
    }
    for item in &snapshot.execution_events {
        insert_event(&tx, item)?;
    }

    tx.commit()?;
    tracing::info!(
        conversations = snapshot.conversations.len(),
        executions = snapshot.executions.len(),
        events = snapshot.execution_events.len(),
        "Replaced execution domain snapshot"
    );
    Ok(())
}
