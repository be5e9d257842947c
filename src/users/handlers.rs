use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::MessageResponse,
        extractors::AdminUser,
        repo::is_unique_violation,
        repo_types::User,
    },
    error::ApiError,
    state::AppState,
    users::dto::{UpdateUserRequest, UserResponse},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = User::list(&state.db)
        .await
        .map_err(|e| ApiError::internal("Could not fetch users", e))?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(|e| ApiError::internal("Could not fetch user", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(email) = &payload.email {
        payload.email = Some(email.trim().to_lowercase());
    }
    payload.validate()?;

    let user = User::update_account(
        &state.db,
        id,
        payload.username.as_deref(),
        payload.email.as_deref(),
        payload.role,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            warn!(user_id = %id, "duplicate username or email on update");
            ApiError::Conflict("Email or username already exists".into())
        } else {
            ApiError::internal("Could not update user", e)
        }
    })?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, admin_id = %admin.0.id, "user updated");
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = User::delete(&state.db, id)
        .await
        .map_err(|e| ApiError::internal("Could not delete user", e))?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, admin_id = %admin.0.id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully".into(),
    }))
}
