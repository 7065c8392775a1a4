use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::SessionTtl;
use crate::db::codec::{bool_column, format_timestamp, parse_timestamp};
use crate::db::models::{Role, Session, User};
use crate::db::DbPool;
use crate::engine::crypto;
use crate::error::AppError;

const REMOTE_USER_ID_PREFIX: &str = "u_";
const DEFAULT_REMOTE_USER_ID: &str = "u_remote_user";

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    let role: String = row.get("role")?;
    Ok(Session {
        access_token: row.get("access_token")?,
        refresh_token: row.get("refresh_token")?,
        workspace_id: row.get("workspace_id")?,
        user_id: row.get("user_id")?,
        display_name: row.get("display_name")?,
        role: Role::from_stored(&role),
        expires_at: row.get("expires_at")?,
        refresh_expires_at: row.get("refresh_expires_at")?,
        revoked: bool_column(row, "revoked")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// A timestamp that cannot be parsed counts as already past.
fn is_past(raw: &str, now: DateTime<Utc>) -> bool {
    parse_timestamp(raw).map(|at| now > at).unwrap_or(true)
}

fn insert(conn: &Connection, session: &Session) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO sessions
         (access_token, refresh_token, workspace_id, user_id, display_name, role,
          expires_at, refresh_expires_at, revoked, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
        params![
            session.access_token,
            session.refresh_token,
            session.workspace_id,
            session.user_id,
            session.display_name,
            session.role.as_str(),
            session.expires_at,
            session.refresh_expires_at,
            session.created_at,
        ],
    )?;
    Ok(())
}

fn mint(
    ttl: &SessionTtl,
    workspace_id: &str,
    user_id: &str,
    display_name: &str,
    role: Role,
) -> Session {
    let now = Utc::now();
    let issued_at = format_timestamp(now);
    let (access_token, refresh_token) = crypto::generate_token_pair();
    Session {
        access_token,
        refresh_token,
        workspace_id: workspace_id.to_string(),
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        role,
        expires_at: format_timestamp(now + ttl.access),
        refresh_expires_at: format_timestamp(now + ttl.refresh),
        revoked: false,
        created_at: issued_at.clone(),
        updated_at: issued_at,
    }
}

// ============================================================================
// Session lifecycle
// ============================================================================

pub fn create_session(pool: &DbPool, ttl: &SessionTtl, user: &User) -> Result<Session, AppError> {
    let session = mint(ttl, &user.workspace_id, &user.id, &user.display_name, user.role);
    let conn = pool.get()?;
    insert(&conn, &session)?;
    tracing::info!(workspace_id = %session.workspace_id, user_id = %session.user_id, "Session created");
    Ok(session)
}

/// Session for a token-authenticated remote identity that has no local user row.
pub fn create_session_with_role(
    pool: &DbPool,
    ttl: &SessionTtl,
    workspace_id: &str,
    username: &str,
    role: Role,
) -> Result<Session, AppError> {
    let username = username.trim();
    let user_id = if username.is_empty() {
        DEFAULT_REMOTE_USER_ID.to_string()
    } else {
        format!("{REMOTE_USER_ID_PREFIX}{username}")
    };
    let display_name = user_id
        .strip_prefix(REMOTE_USER_ID_PREFIX)
        .unwrap_or(&user_id)
        .to_string();

    let session = mint(ttl, workspace_id.trim(), &user_id, &display_name, role);
    let conn = pool.get()?;
    insert(&conn, &session)?;
    tracing::info!(workspace_id = %session.workspace_id, user_id = %session.user_id, "Remote session created");
    Ok(session)
}

/// Revoked, expired and unknown tokens all come back as `None`.
pub fn get_session(pool: &DbPool, access_token: &str) -> Result<Option<Session>, AppError> {
    let conn = pool.get()?;
    let session = conn
        .query_row(
            "SELECT * FROM sessions WHERE access_token = ?1",
            params![access_token.trim()],
            row_to_session,
        )
        .optional()?;

    Ok(session.filter(|s| !s.revoked && !is_past(&s.expires_at, Utc::now())))
}

/// Rotate both tokens of a live session. The presented refresh token stops
/// working immediately; `None` when it is unknown, revoked or past expiry.
pub fn refresh_session(
    pool: &DbPool,
    ttl: &SessionTtl,
    refresh_token: &str,
) -> Result<Option<Session>, AppError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let current = tx
        .query_row(
            "SELECT * FROM sessions WHERE refresh_token = ?1",
            params![refresh_token.trim()],
            row_to_session,
        )
        .optional()?;
    let current = match current {
        Some(s) if !s.revoked && !is_past(&s.refresh_expires_at, Utc::now()) => s,
        _ => return Ok(None),
    };

    let rotated = mint(
        ttl,
        &current.workspace_id,
        &current.user_id,
        &current.display_name,
        current.role,
    );
    tx.execute(
        "UPDATE sessions
         SET access_token = ?1, refresh_token = ?2, expires_at = ?3,
             refresh_expires_at = ?4, revoked = 0, updated_at = ?5
         WHERE access_token = ?6",
        params![
            rotated.access_token,
            rotated.refresh_token,
            rotated.expires_at,
            rotated.refresh_expires_at,
            rotated.updated_at,
            current.access_token,
        ],
    )?;
    tx.commit()?;

    tracing::debug!(workspace_id = %rotated.workspace_id, user_id = %rotated.user_id, "Session rotated");
    Ok(Some(rotated))
}

/// Idempotent: unknown or already-revoked tokens are not an error.
pub fn revoke_session(pool: &DbPool, access_token: &str) -> Result<(), AppError> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE sessions SET revoked = 1, updated_at = ?1 WHERE access_token = ?2",
        params![format_timestamp(Utc::now()), access_token.trim()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::db::init_test_db;
    use crate::db::models::{AuthMode, Workspace, WorkspaceMode};
    use crate::db::repos::access::credentials::authenticate;
    use crate::db::repos::workspace::workspaces;

    fn alice(pool: &DbPool) -> User {
        authenticate(pool, "ws1", "alice", "pw", None, true).unwrap()
    }

    #[test]
    fn created_session_is_readable_until_revoked() {
        let pool = init_test_db().unwrap();
        let ttl = SessionTtl::default();
        let session = create_session(&pool, &ttl, &alice(&pool)).unwrap();

        let fetched = get_session(&pool, &session.access_token).unwrap().unwrap();
        assert_eq!(fetched, session);

        revoke_session(&pool, &session.access_token).unwrap();
        revoke_session(&pool, &session.access_token).unwrap();
        revoke_session(&pool, "at_unknown").unwrap();
        assert!(get_session(&pool, &session.access_token).unwrap().is_none());
        assert!(refresh_session(&pool, &ttl, &session.refresh_token).unwrap().is_none());
    }

    #[test]
    fn padded_tokens_resolve_to_the_session() {
        let pool = init_test_db().unwrap();
        let ttl = SessionTtl::default();
        let session = create_session(&pool, &ttl, &alice(&pool)).unwrap();

        let padded_access = format!("  {}\n", session.access_token);
        assert!(get_session(&pool, &padded_access).unwrap().is_some());

        let rotated = refresh_session(&pool, &ttl, &format!(" {} ", session.refresh_token))
            .unwrap()
            .unwrap();
        assert_ne!(rotated.access_token, session.access_token);

        revoke_session(&pool, &format!("\t{}", rotated.access_token)).unwrap();
        assert!(get_session(&pool, &rotated.access_token).unwrap().is_none());
    }

    #[test]
    fn refresh_rotates_and_old_token_is_single_use() {
        let pool = init_test_db().unwrap();
        let ttl = SessionTtl::default();
        let session = create_session(&pool, &ttl, &alice(&pool)).unwrap();

        let rotated = refresh_session(&pool, &ttl, &session.refresh_token)
            .unwrap()
            .unwrap();
        assert_ne!(rotated.access_token, session.access_token);
        assert_ne!(rotated.refresh_token, session.refresh_token);
        assert_eq!(rotated.user_id, session.user_id);
        assert_eq!(rotated.role, session.role);

        assert!(refresh_session(&pool, &ttl, &session.refresh_token).unwrap().is_none());
        assert!(get_session(&pool, &session.access_token).unwrap().is_none());
        assert!(get_session(&pool, &rotated.access_token).unwrap().is_some());
    }

    #[test]
    fn expired_tokens_read_as_absent() {
        let pool = init_test_db().unwrap();
        let user = alice(&pool);
        let ttl = SessionTtl::new(Duration::seconds(1), Duration::seconds(2)).unwrap();
        let session = create_session(&pool, &ttl, &user).unwrap();

        let conn = pool.get().unwrap();
        let past = format_timestamp(Utc::now() - Duration::hours(1));
        conn.execute(
            "UPDATE sessions SET expires_at = ?1, refresh_expires_at = ?1 WHERE access_token = ?2",
            params![past, session.access_token],
        )
        .unwrap();
        drop(conn);

        assert!(get_session(&pool, &session.access_token).unwrap().is_none());
        assert!(refresh_session(&pool, &ttl, &session.refresh_token).unwrap().is_none());
    }

    #[test]
    fn remote_identity_session_derives_user_id() {
        let pool = init_test_db().unwrap();
        let ttl = SessionTtl::default();
        let named = create_session_with_role(&pool, &ttl, "ws1", " carol ", Role::Approver).unwrap();
        assert_eq!(named.user_id, "u_carol");
        assert_eq!(named.display_name, "carol");
        assert_eq!(named.role, Role::Approver);

        let anonymous = create_session_with_role(&pool, &ttl, "ws1", "", Role::Viewer).unwrap();
        assert_eq!(anonymous.user_id, "u_remote_user");
        assert_eq!(anonymous.display_name, "remote_user");
    }

    #[test]
    fn end_to_end_remote_workspace_login() {
        let pool = init_test_db().unwrap();
        let workspace = workspaces::upsert(
            &pool,
            Workspace {
                id: "ws1".into(),
                name: "Team".into(),
                mode: WorkspaceMode::Remote,
                hub_url: Some("https://hub.example".into()),
                is_default_local: false,
                created_at: String::new(),
                login_disabled: false,
                auth_mode: Some(AuthMode::PasswordOrToken),
            },
        )
        .unwrap();
        assert_eq!(workspace.auth_mode, Some(AuthMode::PasswordOrToken));

        let user = authenticate(&pool, &workspace.id, "alice", "pw", None, true).unwrap();
        assert_eq!(user.role, Role::Admin);

        let session = create_session(&pool, &SessionTtl::default(), &user).unwrap();
        assert_ne!(session.access_token, session.refresh_token);
        let access = parse_timestamp(&session.expires_at).unwrap();
        let refresh = parse_timestamp(&session.refresh_expires_at).unwrap();
        assert!(access < refresh);
    }
}
