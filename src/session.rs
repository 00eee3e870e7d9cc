//! Cookie sessions.
//!
//! Login hands out two HttpOnly cookies: a short-lived access token and a
//! long-lived refresh token, both stateless HMAC-signed strings (see
//! [`crate::security::issue_token`]). Handlers that need a signed-in user
//! take [`AuthUser`] (or [`AdminUser`]) as an extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

use crate::config::Config;
use crate::constants::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::AppError;
use crate::models::User;
use crate::security::{issue_token, verify_token, TokenKind};
use crate::AppState;

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Add fresh access and refresh cookies for the user
pub fn start_session(jar: CookieJar, config: &Config, user_id: i64) -> CookieJar {
    let now = Utc::now().timestamp();
    let secure = config.is_production();

    let access = issue_token(
        user_id,
        TokenKind::Access,
        now + config.access_token_ttl_secs,
        &config.session_secret,
    );
    let refresh = issue_token(
        user_id,
        TokenKind::Refresh,
        now + config.refresh_token_ttl_secs,
        &config.session_secret,
    );

    jar.add(session_cookie(ACCESS_COOKIE, access, config.access_token_ttl_secs, secure))
        .add(session_cookie(REFRESH_COOKIE, refresh, config.refresh_token_ttl_secs, secure))
}

/// Expire both session cookies
pub fn end_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// User id carried by a valid refresh cookie
pub fn refresh_claims(jar: &CookieJar, config: &Config) -> Option<i64> {
    let token = jar.get(REFRESH_COOKIE)?;
    verify_token(
        token.value(),
        TokenKind::Refresh,
        &config.session_secret,
        Utc::now().timestamp(),
    )
    .map(|claims| claims.user_id)
}

/// Access token from the cookie, falling back to `Authorization: Bearer`
fn access_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// A signed-in user whose account still exists
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = verify_token(
            &token,
            TokenKind::Access,
            &state.config.session_secret,
            Utc::now().timestamp(),
        )
        .ok_or(AppError::Unauthorized)?;

        let user = User::find_by_id(&state.db, claims.user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Session for deleted user {}", claims.user_id);
                AppError::Unauthorized
            })?;

        Ok(AuthUser(user))
    }
}

/// A signed-in administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!("Non-admin user {} attempted an admin action", user.id);
            return Err(AppError::Forbidden("需要管理员权限".to_string()));
        }
        Ok(AdminUser(user))
    }
}
