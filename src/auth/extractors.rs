use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo_types::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

/// Authenticated caller: bearer token verified and resolved to a live user
/// row, so tokens for deleted accounts stop working immediately.
pub struct CurrentUser(pub User);

pub(crate) async fn resolve_bearer(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized("No token provided"))?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|_| {
        warn!("bearer token rejected");
        ApiError::Unauthorized("Not authorized")
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "user lookup failed during auth");
            ApiError::Unauthorized("Not authorized")
        })?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_bearer(&parts.headers, state).await?;
        Ok(CurrentUser(user))
    }
}

/// Authenticated caller with the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_bearer(&parts.headers, state).await?;
        if user.role != Role::Admin {
            warn!(user_id = %user.id, "admin route refused");
            return Err(ApiError::Forbidden("Require Admin Role"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn accepts_lowercase_scheme() {
        let headers = headers_with("bearer abc");
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_missing_header() {
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
