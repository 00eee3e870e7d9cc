use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_NOTIFICATION_LIMIT, MAX_NOTIFICATION_LIMIT};
use crate::error::{AppError, Result};
use crate::models::{Notification, NotificationCategory, UnreadCounts};
use crate::routes::{validation, SuccessResponse};
use crate::session::AuthUser;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub category: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub success: bool,
    pub updated: u64,
}

fn category(value: Option<&str>) -> Result<Option<NotificationCategory>> {
    validation::parse_optional("通知分类", value)
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>> {
    let category = category(params.category.as_deref())?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);

    let notifications =
        Notification::list(&state.db, user.id, category, params.unread_only, limit).await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UnreadCounts>> {
    Ok(Json(Notification::unread_counts(&state.db, user.id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    if !Notification::mark_read(&state.db, notification_id, user.id).await? {
        return Err(AppError::NotificationNotFound);
    }
    Ok(Json(SuccessResponse::ok()))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<CategoryParams>,
) -> Result<Json<MarkedResponse>> {
    let category = category(params.category.as_deref())?;
    let updated = Notification::mark_all_read(&state.db, user.id, category).await?;
    tracing::debug!("User {} marked {} notifications read", user.id, updated);

    Ok(Json(MarkedResponse {
        success: true,
        updated,
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    if !Notification::delete(&state.db, notification_id, user.id).await? {
        return Err(AppError::NotificationNotFound);
    }
    Ok(Json(SuccessResponse::ok()))
}
