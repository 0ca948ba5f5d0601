use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use crate::config::CookieConfig;

pub const SESSION_COOKIE: &str = "token";

/// HttpOnly, site-wide, usable from a frontend on another origin.
pub fn session_cookie(cfg: &CookieConfig, token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::None)
        .max_age(max_age)
        .expires(OffsetDateTime::now_utc() + max_age)
        .build()
}

/// Empty value, already expired.
pub fn cleared_session_cookie(cfg: &CookieConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::None)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
}
