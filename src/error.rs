use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failure taxonomy. Every variant maps to one HTTP status and
/// a stable `{"message": ...}` body; internal detail is logged, never echoed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Email not confirmed. Please check your email and confirm your account before logging in.")]
    EmailNotConfirmed {
        confirmation_token: Option<String>,
    },

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(message: &'static str, source: anyhow::Error) -> Self {
        Self::Internal { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) | Self::InvalidToken(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::EmailNotConfirmed { .. } | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal { message, source } = &self {
            error!(error = ?source, "{message}");
        }
        let body = match &self {
            Self::EmailNotConfirmed { confirmation_token } => json!({
                "message": self.to_string(),
                "confirmationToken": confirmation_token,
            }),
            _ => json!({ "message": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}
