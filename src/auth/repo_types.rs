use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role, stored as the `user_role` enum in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, not exposed in JSON
    pub role: Role,
    pub is_email_confirmed: bool,
    pub confirmation_token: Option<String>, // plaintext, cleared on confirmation
    pub confirmation_token_expires: Option<OffsetDateTime>,
    pub reset_password_token: Option<String>, // sha-256 hex of the emailed token
    pub reset_password_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}
