use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User};

/// Insert payload for a user row. Password must already be hashed.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub is_email_confirmed: bool,
    pub confirmation_token: Option<&'a str>,
    pub confirmation_token_expires: Option<OffsetDateTime>,
}

/// True when the error chain bottoms out in a Postgres unique violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Exact match on the stored plaintext confirmation token.
    pub async fn find_by_confirmation_token(
        db: &PgPool,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE confirmation_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Lookup by the persisted reset-token digest. Expiry is checked by the
    /// caller so wrong-token and expired-token stay indistinguishable there.
    pub async fn find_by_reset_token(
        db: &PgPool,
        token_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE reset_password_token = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, is_email_confirmed,
                               confirmation_token, confirmation_token_expires)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, password_hash, role, is_email_confirmed,
                      confirmation_token, confirmation_token_expires,
                      reset_password_token, reset_password_expires, created_at
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.is_email_confirmed)
        .bind(new.confirmation_token)
        .bind(new.confirmation_token_expires)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Flip the account to confirmed and retire the confirmation token.
    pub async fn mark_email_confirmed(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_email_confirmed = TRUE,
                confirmation_token = NULL,
                confirmation_token_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Overwrites any pending reset, so only the newest emailed token works.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_password_token = $2, reset_password_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_password_token = NULL, reset_password_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Store the freshly hashed password and close the pending reset.
    pub async fn complete_password_reset(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_password_token = NULL,
                reset_password_expires = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_any_admin(db: &PgPool) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_email_confirmed,
                   confirmation_token, confirmation_token_expires,
                   reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE role = 'admin'
            LIMIT 1
            "#,
        )
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("network down")));
    }

    #[test]
    fn non_database_sqlx_errors_are_not_unique_violations() {
        let err = anyhow::Error::from(sqlx::Error::RowNotFound);
        assert!(!is_unique_violation(&err));
    }
}
