use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

impl User {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Apply a partial update; absent fields keep their current value.
    /// Returns None when the row does not exist.
    pub async fn update_account(
        db: &PgPool,
        id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                role = COALESCE($4, role)
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, is_email_confirmed,
                      confirmation_token, confirmation_token_expires,
                      reset_password_token, reset_password_expires, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(role)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
