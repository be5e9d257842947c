use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::Role;
use crate::error::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation(
            "Password must contain a number".into(),
        ));
    }
    Ok(())
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(ApiError::Validation("All fields are required".into()));
        }
        if self.username.len() < 3 {
            return Err(ApiError::Validation(
                "Username must be at least 3 characters long".into(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        check_password(&self.password)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password is required".into()));
        }
        Ok(())
    }
}

/// Request body carrying an emailed confirmation token.
#[derive(Debug, Deserialize)]
pub struct ConfirmEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        Ok(())
    }
}

/// Request body for the reset endpoint; the token itself rides in the path.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_password(&self.password)
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: None,
        }
    }

    #[test]
    fn accepts_plain_addresses_and_rejects_junk() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("a lice@x.com"));
    }

    #[test]
    fn register_requires_all_fields() {
        let err = register("", "alice@x.com", "secret1").validate().unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");
    }

    #[test]
    fn register_enforces_username_length() {
        let err = register("al", "alice@x.com", "secret1").validate().unwrap_err();
        assert_eq!(err.to_string(), "Username must be at least 3 characters long");
    }

    #[test]
    fn register_enforces_password_rules() {
        let err = register("alice", "alice@x.com", "s1").validate().unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters long");

        let err = register("alice", "alice@x.com", "secrets").validate().unwrap_err();
        assert_eq!(err.to_string(), "Password must contain a number");

        assert!(register("alice", "alice@x.com", "secret1").validate().is_ok());
    }

    #[test]
    fn login_rejects_bad_email_and_empty_password() {
        let bad_email = LoginRequest {
            email: "nope".into(),
            password: "secret1".into(),
        };
        assert_eq!(bad_email.validate().unwrap_err().to_string(), "Invalid email");

        let empty_password = LoginRequest {
            email: "alice@x.com".into(),
            password: "".into(),
        };
        assert_eq!(
            empty_password.validate().unwrap_err().to_string(),
            "Password is required"
        );
    }

    #[test]
    fn login_response_shape() {
        let response = LoginResponse {
            token: "jwt".into(),
            user: PublicUser {
                id: Uuid::new_v4(),
                email: "alice@x.com".into(),
                role: Role::User,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["email"], "alice@x.com");
        assert_eq!(json["user"]["role"], "user");
        assert!(json["user"]["id"].is_string());
        assert_eq!(json["token"], "jwt");
    }
}
