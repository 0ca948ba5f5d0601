use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use tracing::instrument;

use crate::{
    auth::{
        cookie::{cleared_session_cookie, session_cookie, session_token},
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
            LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
            UpdateProfileRequest, UserProfile,
        },
        extractors::AuthUser,
        jwt::SessionKeys,
        services::{self, Session},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/getuser", get(get_user))
        .route("/loggedinstatus", get(login_status))
        .route("/updateuser", patch(update_user))
        .route("/changePassword", patch(change_password))
        .route("/forgotpassword", post(forgot_password))
        .route("/resetpassword/:reset_token", put(reset_password))
}

fn with_session_cookie(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<AuthResponse>) {
    let max_age = SessionKeys::new(&state.config.jwt).ttl();
    let jar = jar.add(session_cookie(
        &state.config.cookie,
        session.token.clone(),
        max_age,
    ));
    (
        jar,
        Json(AuthResponse {
            user: session.user,
            token: session.token,
        }),
    )
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let session = services::register(&state, payload).await?;
    let (jar, body) = with_session_cookie(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = services::login(&state, payload).await?;
    Ok(with_session_cookie(&state, jar, session))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(cleared_session_cookie(&state.config.cookie)),
        Json(MessageResponse::new("Successfully logged out")),
    )
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(services::get_profile(&state, user.id).await?))
}

#[instrument(skip(state, jar))]
pub async fn login_status(State(state): State<AppState>, jar: CookieJar) -> Json<bool> {
    Json(services::login_status(&state, session_token(&jar)).await)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateProfileRequest>, AppError>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(services::update_profile(&state, user.id, payload).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<ChangePasswordRequest>, AppError>,
) -> AppResult<&'static str> {
    services::change_password(&state, user.id, payload).await?;
    Ok("Password change successful")
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ForgotPasswordRequest>, AppError>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    services::forgot_password(&state, payload).await?;
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Reset Email Sent".into(),
    }))
}

#[instrument(skip(state, reset_token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<ResetPasswordRequest>, AppError>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, &reset_token, payload).await?;
    Ok(Json(MessageResponse::new(
        "Password Reset Successful, Please Login",
    )))
}
