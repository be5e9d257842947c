use axum::{
    extract::{FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
            MessageResponse, PublicUser, RegisterRequest, RegisterResponse, ResetPasswordRequest,
        },
        extractors::{resolve_bearer, CurrentUser},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{is_unique_violation, NewUser},
        repo_types::{Role, User},
        tokens::{generate_token, hash_reset_token, token_window_open},
    },
    error::ApiError,
    state::AppState,
};

const CONFIRMATION_TOKEN_TTL: Duration = Duration::hours(24);
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/confirm-email", post(confirm_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:resettoken", put(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// Identity behind the presented bearer token. Note this only requires a
/// verifiable token, not a confirmed email.
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.id,
        email: user.email,
        role: user.role,
    })
}

#[instrument(skip(state, headers, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate()?;

    let role = payload.role.unwrap_or_default();
    if role == Role::Admin {
        // Only an authenticated admin may mint another admin account.
        let caller = resolve_bearer(&headers, &state)
            .await
            .map_err(|_| ApiError::Forbidden("Unauthorized to create admin account"))?;
        if caller.role != Role::Admin {
            warn!(caller_id = %caller.id, "admin registration refused");
            return Err(ApiError::Forbidden("Unauthorized to create admin account"));
        }
    }

    let taken = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(|e| ApiError::internal("An error occurred during registration", e))?;
    if taken.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email or username already exists".into()));
    }

    let confirmation_token = generate_token();
    let expires = OffsetDateTime::now_utc() + CONFIRMATION_TOKEN_TTL;

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal("An error occurred during registration", e))?;

    let user = User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            role,
            is_email_confirmed: false,
            confirmation_token: Some(&confirmation_token),
            confirmation_token_expires: Some(expires),
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            warn!(email = %payload.email, username = %payload.username, "duplicate user");
            ApiError::Conflict("Email or username already exists".into())
        } else {
            ApiError::internal("An error occurred during registration", e)
        }
    })?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign_registration(user.id, user.role)
        .map_err(|e| ApiError::internal("An error occurred during registration", e))?;

    let confirmation_url = format!(
        "{}/api/v1/auth/confirm-email/{}",
        state.config.public_base_url, confirmation_token
    );
    // Delivery is best-effort: the account exists either way and the user can
    // recover via the pending token returned on a pre-confirmation login.
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Please confirm your email",
            &format!(
                "Thank you for registering. Please confirm your email by clicking on the following link: \n\n {confirmation_url}"
            ),
        )
        .await
    {
        warn!(error = %e, user_id = %user.id, "confirmation email failed to send");
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message:
                "User registered successfully. Please check your email to confirm your account."
                    .into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate()?;

    // Unknown email and wrong password share one error body.
    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(|e| ApiError::internal("An error occurred during login", e))?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::InvalidCredentials
        })?;

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| ApiError::internal("An error occurred during login", e))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.is_email_confirmed {
        warn!(user_id = %user.id, "login before email confirmation");
        return Err(ApiError::EmailNotConfirmed {
            confirmation_token: user.confirmation_token,
        });
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign_session(user.id, user.role)
        .map_err(|e| ApiError::internal("An error occurred during login", e))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser {
            id: user.id,
            email: user.email,
            role: user.role,
        },
    }))
}

fn confirmation_expired(expires: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    expires.map(|t| t < now).unwrap_or(false)
}

#[instrument(skip(state, payload))]
pub async fn confirm_email(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.token.is_empty() {
        return Err(ApiError::Validation("Token is required".into()));
    }

    let user = User::find_by_confirmation_token(&state.db, &payload.token)
        .await
        .map_err(|e| ApiError::internal("Could not confirm email", e))?
        .ok_or_else(|| ApiError::InvalidToken("Invalid confirmation token".into()))?;

    if user.is_email_confirmed {
        return Err(ApiError::InvalidToken("Email already confirmed".into()));
    }

    if confirmation_expired(user.confirmation_token_expires, OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "confirmation token expired");
        return Err(ApiError::InvalidToken(
            "Confirmation token has expired".into(),
        ));
    }

    User::mark_email_confirmed(&state.db, user.id)
        .await
        .map_err(|e| ApiError::internal("Could not confirm email", e))?;

    info!(user_id = %user.id, "email confirmed");
    Ok(Json(MessageResponse {
        message: "Email confirmed successfully".into(),
    }))
}

async fn issue_reset_token(state: &AppState, user: &User) -> anyhow::Result<()> {
    let reset_token = generate_token();
    let expires = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    // Only the digest is persisted; the plaintext leaves through email alone.
    User::set_reset_token(&state.db, user.id, &hash_reset_token(&reset_token), expires).await?;

    let reset_url = format!(
        "{}/api/v1/auth/reset-password/{}",
        state.config.public_base_url, reset_token
    );
    state
        .mailer
        .send(
            &user.email,
            "Password Reset Token",
            &format!(
                "You are receiving this email because you (or someone else) has requested the reset of a password. Please make a PUT request to: \n\n {reset_url}"
            ),
        )
        .await?;
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate()?;

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(|e| ApiError::internal("Could not process password reset request", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Err(e) = issue_reset_token(&state, &user).await {
        // Best-effort rollback so no half-issued token lingers.
        if let Err(clear_err) = User::clear_reset_token(&state.db, user.id).await {
            tracing::error!(error = %clear_err, user_id = %user.id, "failed to clear pending reset token");
        }
        return Err(ApiError::internal(
            "Could not process password reset request",
            e,
        ));
    }

    info!(user_id = %user.id, "reset token issued");
    Ok(Json(MessageResponse {
        message: "Reset token sent to email".into(),
    }))
}

#[instrument(skip(state, payload, resettoken))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(resettoken): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.validate()?;

    // Wrong and expired tokens are deliberately indistinguishable here.
    let user = User::find_by_reset_token(&state.db, &hash_reset_token(&resettoken))
        .await
        .map_err(|e| ApiError::internal("Could not reset password", e))?
        .filter(|u| token_window_open(u.reset_password_expires, OffsetDateTime::now_utc()))
        .ok_or_else(|| ApiError::InvalidToken("Invalid or expired token".into()))?;

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal("Could not reset password", e))?;

    User::complete_password_reset(&state.db, user.id, &password_hash)
        .await
        .map_err(|e| ApiError::internal("Could not reset password", e))?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successful".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_without_expiry_never_expires() {
        assert!(!confirmation_expired(None, OffsetDateTime::now_utc()));
    }

    #[test]
    fn confirmation_expiry_boundaries() {
        let now = OffsetDateTime::now_utc();
        assert!(confirmation_expired(Some(now - Duration::seconds(1)), now));
        assert!(!confirmation_expired(Some(now + Duration::hours(24)), now));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_share_a_body() {
        use axum::response::IntoResponse;

        // Both failure paths collapse into the same variant; the rendered
        // response must not hint at whether the account exists.
        let response = ApiError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Invalid credentials" }));
    }
}
