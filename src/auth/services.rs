use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, UpdateProfileRequest, UserProfile,
        },
        jwt::SessionKeys,
        password::{ensure_min_length, hash_password, verify_password},
        repo::{CreateUserError, NewUser, ProfileUpdate},
        repo_types::MAX_BIO_LEN,
        reset_token,
    },
    error::{AppError, AppResult},
    mail::Email,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// A user plus the session token minted for them.
#[derive(Debug)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^<>()\[\]\\.,;:\s@]+(\.[^<>()\[\]\\.,;:\s@]+)*@([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}$")
                .expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, non-empty value or `None`.
fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Non-empty value, untrimmed (passwords keep their whitespace).
fn present_secret(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn start_session(st: &AppState, user: crate::auth::repo_types::User) -> AppResult<Session> {
    let token = SessionKeys::new(&st.config.jwt).sign(user.id)?;
    Ok(Session {
        user: user.into(),
        token,
    })
}

pub async fn register(st: &AppState, req: RegisterRequest) -> AppResult<Session> {
    let (Some(name), Some(email), Some(password)) = (
        present(req.name),
        present(req.email),
        present_secret(req.password),
    ) else {
        return Err(AppError::validation("Please fill in all required fields"));
    };
    ensure_min_length(&password)?;
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Please enter a valid email address"));
    }

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email has already been registered".into()));
    }

    let hash = hash_password(&password)?;
    let user = st
        .users
        .create(NewUser {
            name: &name,
            email: &email,
            password_hash: &hash,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::DuplicateEmail => {
                warn!(email = %email, "email registered concurrently");
                AppError::Conflict("Email has already been registered".into())
            }
            CreateUserError::Other(e) => AppError::Internal(e),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    start_session(st, user)
}

pub async fn login(st: &AppState, req: LoginRequest) -> AppResult<Session> {
    let (Some(email), Some(password)) = (present(req.email), present_secret(req.password)) else {
        return Err(AppError::validation("Please add email and password"));
    };

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(&password, &user.password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials(INVALID_CREDENTIALS.into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    start_session(st, user)
}

pub async fn get_profile(st: &AppState, user_id: Uuid) -> AppResult<UserProfile> {
    st.users
        .find_by_id(user_id)
        .await?
        .map(UserProfile::from)
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// True when `token` is a valid session for an existing user.
pub async fn login_status(st: &AppState, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return false;
    };
    let Ok(claims) = SessionKeys::new(&st.config.jwt).verify(token) else {
        return false;
    };
    match st.users.find_by_id(claims.sub).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            error!(error = %e, "login status lookup failed");
            false
        }
    }
}

pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<UserProfile> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let update = ProfileUpdate {
        name: present(req.name).unwrap_or(user.name),
        phone: present(req.phone).unwrap_or(user.phone),
        photo: present(req.photo).unwrap_or(user.photo),
        bio: req.bio.filter(|b| !b.is_empty()).unwrap_or(user.bio),
    };
    if update.bio.chars().count() > MAX_BIO_LEN {
        return Err(AppError::validation(format!(
            "Bio must not be more than {MAX_BIO_LEN} characters long"
        )));
    }

    let updated = st
        .users
        .update_profile(user_id, update)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!(user_id = %user_id, "profile updated");
    Ok(updated.into())
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found, please signup"))?;

    let (Some(old_password), Some(password)) =
        (present_secret(req.old_password), present_secret(req.password))
    else {
        return Err(AppError::validation("Please add old and new password"));
    };
    ensure_min_length(&password)?;

    if !verify_password(&old_password, &user.password)? {
        warn!(user_id = %user_id, "change password with wrong old password");
        return Err(AppError::InvalidCredentials("Old password is incorrect".into()));
    }

    let hash = hash_password(&password)?;
    if !st.users.update_password(user_id, &hash).await? {
        return Err(AppError::not_found("User not found, please signup"));
    }
    info!(user_id = %user_id, "password changed");
    Ok(())
}

pub async fn forgot_password(st: &AppState, req: ForgotPasswordRequest) -> AppResult<()> {
    let email = present(req.email).ok_or_else(|| AppError::validation("Please add an email"))?;
    let user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;

    let removed = st.reset_tokens.delete_for_user(user.id).await?;
    let issued = reset_token::issue(user.id, OffsetDateTime::now_utc());
    st.reset_tokens
        .insert(user.id, &issued.hash, issued.created_at, issued.expires_at)
        .await?;
    info!(user_id = %user.id, superseded = removed, "reset token issued");

    let url = reset_token::reset_url(&st.config.frontend_url, &issued.raw);
    let email = Email {
        subject: "Password Reset Request".into(),
        html_body: reset_email_body(&user.name, &url),
        to: user.email.clone(),
        from: st.config.mail.from.clone(),
    };
    st.mailer.send(email).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "reset email failed");
        AppError::Upstream("Email not sent, please try again".into(), e)
    })?;
    Ok(())
}

fn reset_email_body(name: &str, url: &str) -> String {
    format!(
        "<h2>Hello {name}</h2>\
         <p>Please use the url below to reset your password</p>\
         <p>This reset link is valid for only 30 minutes.</p>\
         <a href=\"{url}\" clicktracking=off>{url}</a>\
         <p>Regards...</p>\
         <p>Inventory Team</p>"
    )
}

pub async fn reset_password(
    st: &AppState,
    raw_token: &str,
    req: ResetPasswordRequest,
) -> AppResult<()> {
    let password = present_secret(req.password)
        .ok_or_else(|| AppError::validation("Please add a new password"))?;
    ensure_min_length(&password)?;

    let hash = hash_password(&password)?;
    let token = st
        .reset_tokens
        .consume(&reset_token::hash_token(raw_token), OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| AppError::not_found("Invalid or expired token"))?;

    match st.users.update_password(token.user_id, &hash).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::not_found("User not found")),
        Err(e) => {
            // Restore the consumed row; the emailed link stays valid.
            if let Err(restore) = st
                .reset_tokens
                .insert(token.user_id, &token.token_hash, token.created_at, token.expires_at)
                .await
            {
                error!(user_id = %token.user_id, error = %restore, "reset token restore failed");
            }
            return Err(e.into());
        }
    }
    info!(user_id = %token.user_id, "password reset");
    Ok(())
}
