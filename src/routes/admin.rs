use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fs;

use crate::constants::{NOTIFICATION_CONTENT_MAX_CHARS, NOTIFICATION_TITLE_MAX_CHARS};
use crate::error::{AppError, Result};
use crate::models::{Family, Notification, NotificationCategory, User, UserProfile};
use crate::routes::{validation, SuccessResponse};
use crate::session::AdminUser;
use crate::AppState;

#[derive(Debug, FromRow)]
struct TableCounts {
    users: i64,
    families: i64,
    records: i64,
    notifications: i64,
    unread_notifications: i64,
    pending_delete_requests: i64,
}

/// Database statistics response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsResponse {
    pub user_count: i64,
    pub family_count: i64,
    pub record_count: i64,
    pub notification_count: i64,
    pub unread_notification_count: i64,
    pub pending_delete_request_count: i64,
    pub database_size_bytes: u64,
    pub database_size_human: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotificationRequest {
    pub title: String,
    pub content: String,
    /// Broadcast to everyone when absent
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub success: bool,
    pub sent: u64,
}

/// Format bytes into human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Row counts and on-disk size of the ledger database
///
/// GET /api/admin/stats
pub async fn admin_stats(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<AdminStatsResponse>> {
    let counts = sqlx::query_as::<_, TableCounts>(
        r#"SELECT (SELECT COUNT(*) FROM users) AS users,
                  (SELECT COUNT(*) FROM families) AS families,
                  (SELECT COUNT(*) FROM records) AS records,
                  (SELECT COUNT(*) FROM notifications) AS notifications,
                  (SELECT COUNT(*) FROM notifications WHERE is_read = 0) AS unread_notifications,
                  (SELECT COUNT(*) FROM delete_requests WHERE status = 'pending') AS pending_delete_requests"#,
    )
    .fetch_one(&state.db)
    .await?;

    // Recent writes may still sit in the WAL file
    let database_size_bytes: u64 = [
        state.config.database_path.clone(),
        format!("{}-wal", state.config.database_path),
    ]
    .iter()
    .map(|path| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
    .sum();

    tracing::info!(
        "Admin stats requested by user {}: {} users, {} records, {} database",
        admin.id,
        counts.users,
        counts.records,
        format_bytes(database_size_bytes)
    );

    Ok(Json(AdminStatsResponse {
        user_count: counts.users,
        family_count: counts.families,
        record_count: counts.records,
        notification_count: counts.notifications,
        unread_notification_count: counts.unread_notifications,
        pending_delete_request_count: counts.pending_delete_requests,
        database_size_bytes,
        database_size_human: format_bytes(database_size_bytes),
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<UserProfile>>> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(users.iter().map(User::profile).collect()))
}

pub async fn set_admin(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<SetAdminRequest>,
) -> Result<Json<UserProfile>> {
    if user_id == admin.id && !payload.is_admin {
        return Err(AppError::InvalidInput("不能取消自己的管理员权限".to_string()));
    }

    if !User::set_admin(&state.db, user_id, payload.is_admin).await? {
        return Err(AppError::UserNotFound);
    }
    tracing::info!(
        "User {} set admin={} for user {}",
        admin.id,
        payload.is_admin,
        user_id
    );

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.profile()))
}

/// Delete an account
///
/// Families the user owns pass to their longest-standing remaining member;
/// families with nobody else left are dissolved. Memberships, notifications
/// and delete requests go with the user row, while the user's records stay in
/// their families.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    if user_id == admin.id {
        return Err(AppError::InvalidInput("不能删除自己的账号".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let user = User::find_by_id(&mut *tx, user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let mut transferred = 0;
    let mut dissolved = 0;
    for family_id in Family::owned_by(&mut *tx, user_id).await? {
        match Family::successor(&mut *tx, family_id, user_id).await? {
            Some(next_owner) => {
                Family::transfer_ownership(&mut *tx, family_id, next_owner).await?;
                transferred += 1;
            }
            None => {
                Family::delete(&mut *tx, family_id).await?;
                dissolved += 1;
            }
        }
    }

    User::delete(&mut *tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(
        "User {} ({}) deleted by admin {}: {} families transferred, {} dissolved",
        user_id,
        user.username,
        admin.id,
        transferred,
        dissolved
    );

    Ok(Json(SuccessResponse::ok()))
}

/// Send a system notification to one user, or to every user
pub async fn send_notification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<SystemNotificationRequest>,
) -> Result<Json<SentResponse>> {
    let title = validation::required_text("标题", &payload.title, NOTIFICATION_TITLE_MAX_CHARS)?;
    let content =
        validation::required_text("内容", &payload.content, NOTIFICATION_CONTENT_MAX_CHARS)?;
    let now = Utc::now().timestamp();

    let sent = match payload.user_id {
        Some(user_id) => {
            User::find_by_id(&state.db, user_id)
                .await?
                .ok_or(AppError::UserNotFound)?;
            Notification::create(
                &state.db,
                user_id,
                NotificationCategory::System,
                &title,
                &content,
                None,
                now,
            )
            .await?;
            1
        }
        None => Notification::broadcast(&state.db, &title, &content, now).await?,
    };

    tracing::info!("Admin {} sent system notification to {} users", admin.id, sent);

    Ok(Json(SentResponse {
        success: true,
        sent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 + 512 * 1024), "3.50 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}
