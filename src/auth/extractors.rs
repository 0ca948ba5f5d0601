use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::{cookie::session_token, jwt::SessionKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Resolves the `token` cookie to a live user record.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar)
            .ok_or_else(|| AppError::unauthorized("Not authorized, please login"))?;

        let claims = SessionKeys::new(&state.config.jwt)
            .verify(token)
            .map_err(|e| {
                warn!(error = %e, "session token rejected");
                AppError::unauthorized("Not authorized, token expired or invalid")
            })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "session for missing user");
                AppError::unauthorized("User not found")
            })?;

        Ok(AuthUser(user))
    }
}
