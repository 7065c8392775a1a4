use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::codec::{bool_column, bool_to_int, now_rfc3339};
use crate::db::models::{CreateUserInput, Role, UpdateUserInput, User};
use crate::db::DbPool;
use crate::engine::crypto;
use crate::error::AppError;
use crate::validation::{require_non_empty, require_valid_id};

const USER_ID_PREFIX: &str = "u_";
const USER_ID_BYTES: usize = 6;

// ============================================================================
// Row Mappers
// ============================================================================

pub(crate) fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        username: row.get("username")?,
        display_name: row.get("display_name")?,
        role: Role::from_stored(&role),
        enabled: bool_column(row, "enabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

// ============================================================================
// Connection-level helpers (shared with credential checks)
// ============================================================================

pub(crate) fn new_user_id() -> String {
    format!("{USER_ID_PREFIX}{}", crypto::random_hex(USER_ID_BYTES))
}

/// User plus stored password hash, looked up by (workspace, username).
pub(crate) fn find_with_hash(
    conn: &Connection,
    workspace_id: &str,
    username: &str,
) -> Result<Option<(User, String)>, AppError> {
    conn.query_row(
        "SELECT * FROM users WHERE workspace_id = ?1 AND username = ?2",
        params![workspace_id, username],
        |row| Ok((row_to_user(row)?, row.get::<_, String>("password_hash")?)),
    )
    .optional()
    .map_err(AppError::Database)
}

pub(crate) fn count_in_workspace(conn: &Connection, workspace_id: &str) -> Result<i64, AppError> {
    Ok(conn.query_row(
        "SELECT COUNT(1) FROM users WHERE workspace_id = ?1",
        params![workspace_id],
        |row| row.get(0),
    )?)
}

pub(crate) fn insert(
    conn: &Connection,
    user: &User,
    password_hash: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO users
         (id, workspace_id, username, password_hash, display_name, role, enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.workspace_id,
            user.username,
            password_hash,
            user.display_name,
            user.role.as_str(),
            bool_to_int(user.enabled),
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

fn load(conn: &Connection, id: &str) -> Result<User, AppError> {
    conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("User {id}")),
            other => AppError::Database(other),
        })
}

// ============================================================================
// User CRUD
// ============================================================================

pub fn list(pool: &DbPool, workspace_id: &str) -> Result<Vec<User>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM users WHERE workspace_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![workspace_id], row_to_user)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<User, AppError> {
    let conn = pool.get()?;
    load(&conn, id)
}

pub fn create(pool: &DbPool, input: CreateUserInput) -> Result<User, AppError> {
    require_valid_id("workspace_id", &input.workspace_id)?;
    require_non_empty("username", &input.username)?;
    require_non_empty("password", &input.password)?;

    let now = now_rfc3339();
    let username = input.username.trim().to_string();
    let display_name = input
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&username)
        .to_string();
    let user = User {
        id: new_user_id(),
        workspace_id: input.workspace_id.trim().to_string(),
        username,
        display_name,
        role: input.role.unwrap_or(Role::Developer),
        enabled: true,
        created_at: now.clone(),
        updated_at: now,
    };

    let conn = pool.get()?;
    insert(&conn, &user, &crypto::hash_password(&input.password))?;
    tracing::info!(workspace_id = %user.workspace_id, user_id = %user.id, role = %user.role, "User created");
    Ok(user)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateUserInput) -> Result<User, AppError> {
    let conn = pool.get()?;
    // Verify exists
    load(&conn, id)?;

    if let Some(ref password) = input.password {
        require_non_empty("password", password)?;
    }
    let display_name = input
        .display_name
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let role = input.role.map(|r| r.as_str().to_string());
    let enabled = input.enabled.map(bool_to_int);
    let password_hash = input.password.as_deref().map(crypto::hash_password);

    let now = now_rfc3339();
    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut param_idx = 2u32;

    push_field!(display_name, "display_name", sets, param_idx);
    push_field!(role, "role", sets, param_idx);
    push_field!(enabled, "enabled", sets, param_idx);
    push_field!(password_hash, "password_hash", sets, param_idx);

    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{}",
        sets.join(", "),
        param_idx
    );

    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];
    if let Some(v) = display_name {
        param_values.push(Box::new(v));
    }
    if let Some(v) = role {
        param_values.push(Box::new(v));
    }
    if let Some(v) = enabled {
        param_values.push(Box::new(v));
    }
    if let Some(v) = password_hash {
        param_values.push(Box::new(v));
    }
    param_values.push(Box::new(id.to_string()));

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())?;

    load(&conn, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput {
            workspace_id: "ws1".into(),
            username: username.into(),
            password: "secret".into(),
            display_name: None,
            role: None,
        }
    }

    #[test]
    fn test_user_crud() {
        let pool = init_test_db().unwrap();

        let bob = create(&pool, input(" bob ")).unwrap();
        assert!(bob.id.starts_with("u_"));
        assert_eq!(bob.username, "bob");
        assert_eq!(bob.display_name, "bob");
        assert_eq!(bob.role, Role::Developer);
        assert!(bob.enabled);

        let carol = create(
            &pool,
            CreateUserInput {
                display_name: Some("Carol C".into()),
                role: Some(Role::Approver),
                ..input("carol")
            },
        )
        .unwrap();

        let listed = list(&pool, "ws1").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(list(&pool, "ws2").unwrap().is_empty());

        let updated = update(
            &pool,
            &carol.id,
            UpdateUserInput {
                role: Some(Role::Viewer),
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.role, Role::Viewer);
        assert!(!updated.enabled);
        assert_eq!(updated.display_name, "Carol C");

        assert!(delete(&pool, &bob.id).unwrap());
        assert!(!delete(&pool, &bob.id).unwrap());
        assert!(get_by_id(&pool, &bob.id).unwrap_err().is_not_found());
    }

    #[test]
    fn password_update_replaces_hash() {
        let pool = init_test_db().unwrap();
        let user = create(&pool, input("dave")).unwrap();
        update(
            &pool,
            &user.id,
            UpdateUserInput {
                password: Some("rotated".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let conn = pool.get().unwrap();
        let (_, hash) = find_with_hash(&conn, "ws1", "dave").unwrap().unwrap();
        assert!(crypto::verify_password("rotated", &hash));
        assert!(!crypto::verify_password("secret", &hash));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let pool = init_test_db().unwrap();
        create(&pool, input("erin")).unwrap();
        assert!(matches!(create(&pool, input("erin")), Err(AppError::Database(_))));
        assert!(matches!(
            create(&pool, CreateUserInput { password: " ".into(), ..input("frank") }),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let pool = init_test_db().unwrap();
        let err = update(&pool, "u_missing", UpdateUserInput::default()).unwrap_err();
        assert!(err.is_not_found());
    }
}
