use crate::state::AppState;
use axum::Router;

pub(crate) mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
