use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::is_valid_email;
use crate::auth::repo_types::{Role, User};
use crate::error::ApiError;

/// Full account view for the admin surface; mirrors the row minus the hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_email_confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_email_confirmed: user.is_email_confirmed,
            created_at: user.created_at,
        }
    }
}

/// Partial update; absent fields are left untouched. Passwords are not
/// editable here, only through the reset flow.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(username) = &self.username {
            if username.len() < 3 {
                return Err(ApiError::Validation(
                    "Username must be at least 3 characters long".into(),
                ));
            }
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                return Err(ApiError::Validation("Invalid email".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_uses_camel_case_and_hides_nothing_sensitive() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            role: Role::Admin,
            is_email_confirmed: true,
            confirmation_token: None,
            confirmation_token_expires: None,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["isEmailConfirmed"], true);
        assert_eq!(json["role"], "admin");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn update_validates_present_fields_only() {
        let empty = UpdateUserRequest {
            username: None,
            email: None,
            role: None,
        };
        assert!(empty.validate().is_ok());

        let bad_email = UpdateUserRequest {
            username: None,
            email: Some("nope".into()),
            role: None,
        };
        assert_eq!(
            bad_email.validate().unwrap_err().to_string(),
            "Invalid email"
        );

        let short_username = UpdateUserRequest {
            username: Some("ab".into()),
            email: None,
            role: None,
        };
        assert!(short_username.validate().is_err());
    }
}
