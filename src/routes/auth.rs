use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{
    NICKNAME_MAX_CHARS, PASSWORD_MAX_CHARS, PASSWORD_MIN_CHARS, SECURITY_TEXT_MAX_CHARS,
};
use crate::error::{AppError, Result};
use crate::models::user::NewUser;
use crate::models::{LoginAttempt, LoginPolicy, User, UserProfile};
use crate::routes::{validation, SuccessResponse};
use crate::security::{
    hash_password_blocking, hash_security_answer, verify_password_blocking, verify_security_answer,
};
use crate::session::{end_session, refresh_claims, start_session, AuthUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    pub security_question: String,
    pub security_answer: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityQuestionResponse {
    pub username: String,
    pub security_question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub username: String,
    pub security_answer: String,
    pub new_password: String,
}

/// Register a new user
///
/// Returns 409 Conflict if the username is taken. The first account ever
/// registered becomes an administrator. On success the session cookies are
/// set, so the client is signed in right away.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<UserProfile>)> {
    let username = payload.username.trim().to_string();
    if !User::validate_username(&username) {
        tracing::warn!("Invalid username format: {}", username);
        return Err(AppError::InvalidInput(
            "用户名需为 3-32 位字母、数字、下划线或汉字".to_string(),
        ));
    }
    validation::password(&payload.password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)?;
    let nickname = validation::optional_text("昵称", &payload.nickname, NICKNAME_MAX_CHARS)?;
    let security_question =
        validation::required_text("密保问题", &payload.security_question, SECURITY_TEXT_MAX_CHARS)?;
    let security_answer =
        validation::required_text("密保答案", &payload.security_answer, SECURITY_TEXT_MAX_CHARS)?;

    if User::find_by_username(&state.db, &username).await?.is_some() {
        tracing::info!("Username already exists: {}", username);
        return Err(AppError::UserAlreadyExists);
    }

    let password_hash = hash_password_blocking(payload.password).await?;
    let security_answer_hash =
        tokio::task::spawn_blocking(move || hash_security_answer(&security_answer)).await??;

    let new_user = NewUser {
        nickname: if nickname.is_empty() { username.clone() } else { nickname },
        username,
        password_hash,
        security_question,
        security_answer_hash,
    };

    let user = User::create(&state.db, &new_user, Utc::now().timestamp())
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::UserAlreadyExists
            }
            other => AppError::Database(other),
        })?;

    tracing::info!("New user registered: {} (id {}, admin: {})", user.username, user.id, user.is_admin);

    let jar = start_session(jar, &state.config, user.id);
    Ok((jar, Json(user.profile())))
}

/// Sign in with username and password
///
/// Failed attempts are counted per username; too many within the window lock
/// the username for a while (429).
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserProfile>)> {
    let username = payload.username.trim().to_string();
    // No account can have this name, so there is nothing to lock
    if !User::validate_username(&username) {
        return Err(AppError::InvalidCredentials);
    }

    let now = Utc::now().timestamp();
    let policy = LoginPolicy::from_config(&state.config);

    let mut attempt = LoginAttempt::load(&state.db, &username)
        .await?
        .unwrap_or_else(|| LoginAttempt::new(&username, now, &policy));
    attempt.check(now)?;

    let user = User::find_by_username(&state.db, &username).await?;
    let valid = match &user {
        Some(user) => verify_password_blocking(payload.password, user.password_hash.clone()).await?,
        None => false,
    };

    let user = match (valid, user) {
        (true, Some(user)) => user,
        _ => {
            let locked = attempt.record_failure(now, &policy);
            LoginAttempt::purge_expired(&state.db, now).await?;
            attempt.save(&state.db).await?;
            tracing::info!("Failed login for username {}", username);
            return Err(if locked {
                AppError::TooManyAttempts
            } else {
                AppError::InvalidCredentials
            });
        }
    };

    LoginAttempt::clear(&state.db, &username).await?;
    tracing::info!("User {} signed in", user.id);

    let jar = start_session(jar, &state.config, user.id);
    Ok((jar, Json(user.profile())))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    (end_session(jar), Json(SuccessResponse::ok()))
}

/// Re-issue the session cookies from a valid refresh cookie
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<UserProfile>)> {
    let user_id = refresh_claims(&jar, &state.config).ok_or(AppError::Unauthorized)?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    tracing::debug!("Refreshed session for user {}", user.id);

    let jar = start_session(jar, &state.config, user.id);
    Ok((jar, Json(user.profile())))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}

/// First step of password recovery: look up the account's security question
pub async fn security_question(
    State(state): State<AppState>,
    Json(payload): Json<UsernameRequest>,
) -> Result<Json<SecurityQuestionResponse>> {
    let user = User::find_by_username(&state.db, payload.username.trim())
        .await?
        .ok_or(AppError::UserNotFound)?;

    if user.security_question.is_empty() {
        return Err(AppError::InvalidInput("该账号未设置密保问题".to_string()));
    }

    Ok(Json(SecurityQuestionResponse {
        username: user.username,
        security_question: user.security_question,
    }))
}

/// Second step of password recovery: answer the question, set a new password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    validation::password(&payload.new_password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)?;

    let user = User::find_by_username(&state.db, payload.username.trim())
        .await?
        .ok_or(AppError::UserNotFound)?;

    let answer = payload.security_answer;
    let answer_hash = user.security_answer_hash.clone();
    let correct =
        tokio::task::spawn_blocking(move || verify_security_answer(&answer, &answer_hash)).await??;
    if !correct {
        tracing::warn!("Wrong security answer for user {}", user.id);
        return Err(AppError::WrongSecurityAnswer);
    }

    let password_hash = hash_password_blocking(payload.new_password).await?;
    User::update_password(&state.db, user.id, &password_hash).await?;
    LoginAttempt::clear(&state.db, &user.username).await?;

    tracing::info!("Password reset via security question for user {}", user.id);

    Ok(Json(SuccessResponse::with_message("密码已重置，请使用新密码登录")))
}
