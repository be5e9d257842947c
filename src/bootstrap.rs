use tracing::info;

use crate::auth::password::hash_password;
use crate::auth::repo::NewUser;
use crate::auth::repo_types::{Role, User};
use crate::state::AppState;

/// Ensure at least one admin account exists so the admin surface is
/// reachable on a fresh database. No-op once any admin is present.
pub async fn create_initial_admin(state: &AppState) -> anyhow::Result<()> {
    if User::find_any_admin(&state.db).await?.is_some() {
        info!("admin user already exists");
        return Ok(());
    }

    let admin = &state.config.admin;
    let password_hash = hash_password(&admin.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username: &admin.username,
            email: &admin.email,
            password_hash: &password_hash,
            role: Role::Admin,
            is_email_confirmed: true,
            confirmation_token: None,
            confirmation_token_expires: None,
        },
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "initial admin user created");
    Ok(())
}
