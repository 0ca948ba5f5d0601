use crate::state::AppState;
use axum::Router;

pub mod cookie;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod reset_token;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
