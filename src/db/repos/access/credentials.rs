use rusqlite::TransactionBehavior;

use crate::db::codec::now_rfc3339;
use crate::db::models::{Role, User};
use crate::db::repos::access::users;
use crate::db::DbPool;
use crate::engine::crypto;
use crate::error::AppError;

/// Verify a password login, optionally creating the user on first sight.
///
/// Unknown user, wrong password and blank fields all fail as
/// `InvalidCredentials`. A disabled user fails as `UserDisabled` before the
/// password is looked at. With `allow_bootstrap`, a missing user is created:
/// the first user of a workspace is always admin, later ones take
/// `requested_role` or developer. The lookup and the insert share one
/// immediate transaction so concurrent bootstraps cannot both see an empty
/// workspace.
pub fn authenticate(
    pool: &DbPool,
    workspace_id: &str,
    username: &str,
    password: &str,
    requested_role: Option<Role>,
    allow_bootstrap: bool,
) -> Result<User, AppError> {
    let workspace_id = workspace_id.trim();
    let username = username.trim();
    if workspace_id.is_empty() || username.is_empty() || password.trim().is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some((user, password_hash)) = users::find_with_hash(&tx, workspace_id, username)? {
        if !user.enabled {
            return Err(AppError::UserDisabled);
        }
        if !crypto::verify_password(password, &password_hash) {
            tracing::debug!(workspace_id, "Password mismatch");
            return Err(AppError::InvalidCredentials);
        }
        return Ok(user);
    }

    if !allow_bootstrap {
        return Err(AppError::InvalidCredentials);
    }

    let role = if users::count_in_workspace(&tx, workspace_id)? == 0 {
        Role::Admin
    } else {
        requested_role.unwrap_or(Role::Developer)
    };
    let now = now_rfc3339();
    let user = User {
        id: users::new_user_id(),
        workspace_id: workspace_id.to_string(),
        username: username.to_string(),
        display_name: username.to_string(),
        role,
        enabled: true,
        created_at: now.clone(),
        updated_at: now,
    };
    users::insert(&tx, &user, &crypto::hash_password(password))?;
    tx.commit()?;

    tracing::info!(workspace_id, user_id = %user.id, role = %user.role, "Bootstrapped user");
    Ok(user)
}
