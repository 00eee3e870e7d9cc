use axum::{extract::State, Json};
use serde::Deserialize;

use crate::constants::{
    AVATAR_MAX_CHARS, BIO_MAX_CHARS, NICKNAME_MAX_CHARS, PASSWORD_MAX_CHARS, PASSWORD_MIN_CHARS,
    SECURITY_TEXT_MAX_CHARS,
};
use crate::error::{AppError, Result};
use crate::models::{User, UserProfile};
use crate::routes::{validation, SuccessResponse};
use crate::security::{hash_password_blocking, hash_security_answer, verify_password_blocking};
use crate::session::AuthUser;
use crate::AppState;

/// Absent fields keep their current value
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecurityRequest {
    pub password: String,
    pub security_question: String,
    pub security_answer: String,
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    let nickname = match payload.nickname {
        Some(nickname) => validation::required_text("昵称", &nickname, NICKNAME_MAX_CHARS)?,
        None => user.nickname.clone(),
    };
    let bio = match payload.bio {
        Some(bio) => validation::optional_text("个人简介", &bio, BIO_MAX_CHARS)?,
        None => user.bio.clone(),
    };
    let avatar = match payload.avatar {
        Some(avatar) => validation::optional_text("头像", &avatar, AVATAR_MAX_CHARS)?,
        None => user.avatar.clone(),
    };

    let updated = User::update_profile(&state.db, user.id, &nickname, &bio, &avatar).await?;
    tracing::info!("Profile updated for user {}", user.id);

    Ok(Json(updated.profile()))
}

async fn confirm_password(user: &User, password: String) -> Result<()> {
    if verify_password_blocking(password, user.password_hash.clone()).await? {
        Ok(())
    } else {
        tracing::warn!("Wrong current password from user {}", user.id);
        Err(AppError::InvalidCredentials)
    }
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    validation::password(&payload.new_password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)?;
    confirm_password(&user, payload.current_password).await?;

    let password_hash = hash_password_blocking(payload.new_password).await?;
    User::update_password(&state.db, user.id, &password_hash).await?;
    tracing::info!("Password changed for user {}", user.id);

    Ok(Json(SuccessResponse::with_message("密码修改成功")))
}

pub async fn update_security_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateSecurityRequest>,
) -> Result<Json<SuccessResponse>> {
    let question =
        validation::required_text("密保问题", &payload.security_question, SECURITY_TEXT_MAX_CHARS)?;
    let answer =
        validation::required_text("密保答案", &payload.security_answer, SECURITY_TEXT_MAX_CHARS)?;
    confirm_password(&user, payload.password).await?;

    let answer_hash = tokio::task::spawn_blocking(move || hash_security_answer(&answer)).await??;
    User::update_security_question(&state.db, user.id, &question, &answer_hash).await?;
    tracing::info!("Security question updated for user {}", user.id);

    Ok(Json(SuccessResponse::with_message("密保问题已更新")))
}
