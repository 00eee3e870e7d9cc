use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::constants::{ERR_NOT_FAMILY_MEMBER, FAMILY_NAME_MAX_CHARS};
use crate::error::{AppError, Result};
use crate::models::{Family, FamilyMember, FamilySummary, MemberRole, Notification, NotificationCategory, User};
use crate::routes::{validation, SuccessResponse};
use crate::security::generate_invite_code;
use crate::session::AuthUser;
use crate::AppState;

/// Attempts at drawing an unused invite code before giving up
const INVITE_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Deserialize)]
pub struct CreateFamilyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnerRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetail {
    #[serde(flatten)]
    pub family: Family,
    pub role: MemberRole,
    pub members: Vec<FamilyMember>,
}

/// Resolve the caller's role in a family: 404 if the family is gone, 403 if not a member
pub async fn require_member(pool: &SqlitePool, family_id: i64, user_id: i64) -> Result<(Family, MemberRole)> {
    let family = Family::find_by_id(pool, family_id)
        .await?
        .ok_or(AppError::FamilyNotFound)?;
    let role = Family::role_of(pool, family_id, user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(ERR_NOT_FAMILY_MEMBER.to_string()))?;
    Ok((family, role))
}

async fn require_owner(pool: &SqlitePool, family_id: i64, user_id: i64) -> Result<Family> {
    let (family, role) = require_member(pool, family_id, user_id).await?;
    if role != MemberRole::Owner {
        return Err(AppError::Forbidden("只有家庭创建者可以执行此操作".to_string()));
    }
    Ok(family)
}

async fn detail(pool: &SqlitePool, family: Family, role: MemberRole) -> Result<FamilyDetail> {
    let members = Family::members(pool, family.id).await?;
    Ok(FamilyDetail {
        family,
        role,
        members,
    })
}

pub(crate) fn display_name(user: &User) -> &str {
    if user.nickname.is_empty() {
        &user.username
    } else {
        &user.nickname
    }
}

pub async fn create_family(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateFamilyRequest>,
) -> Result<Json<FamilyDetail>> {
    let name = validation::required_text("家庭名称", &payload.name, FAMILY_NAME_MAX_CHARS)?;

    let mut invite_code = None;
    for _ in 0..INVITE_CODE_ATTEMPTS {
        let candidate = generate_invite_code();
        if !Family::invite_code_exists(&state.db, &candidate).await? {
            invite_code = Some(candidate);
            break;
        }
    }
    let invite_code = invite_code.ok_or_else(|| {
        tracing::error!("Could not draw an unused invite code");
        AppError::Conflict("邀请码生成失败，请重试".to_string())
    })?;

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    let family = Family::create(&mut *tx, &name, &invite_code, user.id, now).await?;
    Family::add_member(&mut *tx, family.id, user.id, MemberRole::Owner, now).await?;
    tx.commit().await?;

    tracing::info!("Family {} created by user {}", family.id, user.id);

    Ok(Json(detail(&state.db, family, MemberRole::Owner).await?))
}

pub async fn list_families(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<FamilySummary>>> {
    Ok(Json(Family::list_for_user(&state.db, user.id).await?))
}

pub async fn join_family(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<JoinFamilyRequest>,
) -> Result<Json<FamilyDetail>> {
    let code = payload.invite_code.trim().to_uppercase();
    let family = Family::find_by_invite_code(&state.db, &code)
        .await?
        .ok_or(AppError::FamilyNotFound)?;

    if Family::role_of(&state.db, family.id, user.id).await?.is_some() {
        return Err(AppError::Conflict("您已经是该家庭的成员".to_string()));
    }

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    let existing = Family::member_ids(&mut *tx, family.id).await?;
    Family::add_member(&mut *tx, family.id, user.id, MemberRole::Member, now).await?;
    let content = format!("{} 加入了家庭「{}」", display_name(&user), family.name);
    for member_id in existing {
        Notification::create(
            &mut *tx,
            member_id,
            NotificationCategory::Family,
            "新成员加入",
            &content,
            None,
            now,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!("User {} joined family {}", user.id, family.id);

    Ok(Json(detail(&state.db, family, MemberRole::Member).await?))
}

pub async fn get_family(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
) -> Result<Json<FamilyDetail>> {
    let (family, role) = require_member(&state.db, family_id, user.id).await?;
    Ok(Json(detail(&state.db, family, role).await?))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
) -> Result<Json<Vec<FamilyMember>>> {
    require_member(&state.db, family_id, user.id).await?;
    Ok(Json(Family::members(&state.db, family_id).await?))
}

/// Owner removes a member, or a member leaves
///
/// The owner cannot leave while anyone else remains; ownership has to be
/// transferred (or the family dissolved) first.
pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((family_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<SuccessResponse>> {
    let (family, role) = require_member(&state.db, family_id, user.id).await?;
    let leaving = member_id == user.id;

    if leaving && role == MemberRole::Owner {
        let others = Family::member_ids(&state.db, family_id)
            .await?
            .into_iter()
            .any(|id| id != user.id);
        if others {
            return Err(AppError::InvalidInput(
                "家庭创建者不能直接退出，请先转让家庭或解散家庭".to_string(),
            ));
        }

        // Last one out: nothing would be left to own
        Family::delete(&state.db, family_id).await?;
        tracing::info!("Family {} dissolved as its last member {} left", family_id, user.id);
        return Ok(Json(SuccessResponse::ok()));
    }
    if !leaving && role != MemberRole::Owner {
        return Err(AppError::Forbidden("只有家庭创建者可以移除成员".to_string()));
    }

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    if !Family::remove_member(&mut *tx, family_id, member_id).await? {
        return Err(AppError::UserNotFound);
    }

    if leaving {
        Notification::create(
            &mut *tx,
            family.created_by,
            NotificationCategory::Family,
            "成员退出",
            &format!("{} 退出了家庭「{}」", display_name(&user), family.name),
            None,
            now,
        )
        .await?;
    } else {
        Notification::create(
            &mut *tx,
            member_id,
            NotificationCategory::Family,
            "已被移出家庭",
            &format!("您已被移出家庭「{}」", family.name),
            None,
            now,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        "User {} removed from family {} (left voluntarily: {})",
        member_id,
        family_id,
        leaving
    );

    Ok(Json(SuccessResponse::ok()))
}

/// Hand the family over to another member
pub async fn transfer_owner(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
    Json(payload): Json<TransferOwnerRequest>,
) -> Result<Json<FamilyDetail>> {
    let family = require_owner(&state.db, family_id, user.id).await?;
    if payload.user_id == user.id {
        return Err(AppError::InvalidInput("您已经是家庭创建者".to_string()));
    }
    if Family::role_of(&state.db, family_id, payload.user_id).await?.is_none() {
        return Err(AppError::UserNotFound);
    }

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    Family::transfer_ownership(&mut *tx, family_id, payload.user_id).await?;
    Notification::create(
        &mut *tx,
        payload.user_id,
        NotificationCategory::Family,
        "家庭转让",
        &format!("{} 将家庭「{}」转让给了您", display_name(&user), family.name),
        None,
        now,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        "Family {} transferred from user {} to user {}",
        family_id,
        user.id,
        payload.user_id
    );

    let family = Family::find_by_id(&state.db, family_id)
        .await?
        .ok_or(AppError::FamilyNotFound)?;
    Ok(Json(detail(&state.db, family, MemberRole::Member).await?))
}

/// Dissolve the family together with its ledger
pub async fn delete_family(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(family_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let family = require_owner(&state.db, family_id, user.id).await?;

    let now = Utc::now().timestamp();
    let mut tx = state.db.begin().await?;
    let members = Family::member_ids(&mut *tx, family_id).await?;
    Family::delete(&mut *tx, family_id).await?;
    let content = format!("家庭「{}」已被解散，相关礼金记录已删除", family.name);
    for member_id in members.into_iter().filter(|id| *id != user.id) {
        Notification::create(
            &mut *tx,
            member_id,
            NotificationCategory::Family,
            "家庭已解散",
            &content,
            None,
            now,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!("Family {} dissolved by user {}", family_id, user.id);

    Ok(Json(SuccessResponse::ok()))
}
